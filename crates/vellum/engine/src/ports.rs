//! Collaborator ports
//!
//! Identity, audit, notification, and task delivery are external systems.
//! The engine talks to them through object-safe async traits injected at
//! construction; the recording adapters here double as test doubles and as
//! working defaults for embedded use.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use vellum_types::{
    Actor, ActorId, AuditEvent, LifecycleError, LifecycleResult, Notification, TaskDirective,
};

/// Resolves authenticated actors and their permission level.
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    async fn actor(&self, id: &ActorId) -> LifecycleResult<Option<Actor>>;
}

/// Append-only consumer of audit events. Persistence and indexing live
/// behind this boundary.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> LifecycleResult<()>;
}

/// Asynchronous, best-effort message delivery.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> LifecycleResult<()>;
}

/// Opens and closes derived assignee tasks.
#[async_trait]
pub trait TaskBoard: Send + Sync {
    async fn apply(&self, directive: TaskDirective) -> LifecycleResult<()>;
}

// ── In-memory adapters ──────────────────────────────────────────────────────

/// Directory backed by a fixed actor table.
#[derive(Default)]
pub struct StaticActorDirectory {
    actors: Mutex<HashMap<ActorId, Actor>>,
}

impl StaticActorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, actor: Actor) {
        if let Ok(mut actors) = self.actors.lock() {
            actors.insert(actor.id.clone(), actor);
        }
    }
}

#[async_trait]
impl ActorDirectory for StaticActorDirectory {
    async fn actor(&self, id: &ActorId) -> LifecycleResult<Option<Actor>> {
        let actors = self
            .actors
            .lock()
            .map_err(|_| LifecycleError::Storage("actor table lock poisoned".to_string()))?;
        Ok(actors.get(id).cloned())
    }
}

/// Sink that retains every event, newest last.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) -> LifecycleResult<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| LifecycleError::Storage("audit lock poisoned".to_string()))?;
        events.push(event);
        Ok(())
    }
}

/// Dispatcher that retains every notification instead of delivering it.
#[derive(Default)]
pub struct RecordingNotificationDispatcher {
    sent: Mutex<Vec<Notification>>,
    /// When set, every dispatch fails; used to exercise best-effort paths.
    fail: std::sync::atomic::AtomicBool,
}

impl RecordingNotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotificationDispatcher {
    async fn dispatch(&self, notification: Notification) -> LifecycleResult<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LifecycleError::Storage("dispatcher unavailable".to_string()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| LifecycleError::Storage("notification lock poisoned".to_string()))?;
        sent.push(notification);
        Ok(())
    }
}

/// Task board that tracks open tasks by key. Closing an absent key is a
/// no-op, matching the directive contract.
#[derive(Default)]
pub struct RecordingTaskBoard {
    open: Mutex<HashMap<String, TaskDirective>>,
}

impl RecordingTaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_tasks(&self) -> Vec<String> {
        self.open
            .lock()
            .map(|o| {
                let mut keys = o.keys().cloned().collect::<Vec<_>>();
                keys.sort();
                keys
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl TaskBoard for RecordingTaskBoard {
    async fn apply(&self, directive: TaskDirective) -> LifecycleResult<()> {
        let mut open = self
            .open
            .lock()
            .map_err(|_| LifecycleError::Storage("task board lock poisoned".to_string()))?;
        match &directive {
            TaskDirective::Open { key, .. } => {
                open.insert(key.clone(), directive.clone());
            }
            TaskDirective::Close { key } => {
                open.remove(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_types::{AccessLevel, DocumentId, TaskKind, WorkflowId};

    #[tokio::test]
    async fn static_directory_resolves_registered_actors() {
        let directory = StaticActorDirectory::new();
        directory.register(Actor::new(
            ActorId::new("alice"),
            "Alice",
            AccessLevel::Contributor,
        ));

        let found = directory.actor(&ActorId::new("alice")).await.unwrap();
        assert_eq!(found.unwrap().name, "Alice");
        assert!(directory.actor(&ActorId::new("ghost")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn task_board_open_close_round_trip() {
        let board = RecordingTaskBoard::new();
        let workflow_id = WorkflowId::new("wf-1");
        board
            .apply(TaskDirective::open(
                TaskKind::Review,
                DocumentId::new("doc-1"),
                &workflow_id,
                ActorId::new("bob"),
            ))
            .await
            .unwrap();
        assert_eq!(board.open_tasks(), vec!["review:wf-1".to_string()]);

        board
            .apply(TaskDirective::close(TaskKind::Review, &workflow_id))
            .await
            .unwrap();
        assert!(board.open_tasks().is_empty());

        // Closing again is harmless.
        board
            .apply(TaskDirective::close(TaskKind::Review, &workflow_id))
            .await
            .unwrap();
    }
}
