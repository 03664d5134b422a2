//! Commit vocabulary
//!
//! A `CommitRequest` is the unit of mutation: guards re-asserted inside the
//! commit, writes applied in order, and side effects enqueued to the outbox.
//! The store applies the whole request or none of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vellum_types::{
    Document, DocumentId, DocumentState, FamilyId, SideEffect, Transition, VersionNumber,
    Workflow, WorkflowId,
};

/// Optimistic precondition evaluated inside the commit, before any write.
///
/// A failing guard rejects the whole request with `StoreError::Conflict`.
#[derive(Clone, Debug)]
pub enum CommitGuard {
    /// The workflow row still carries the revision the caller loaded.
    WorkflowRevision { workflow_id: WorkflowId, expected: u64 },
    /// The document is still in the status the caller observed.
    DocumentStatus {
        document_id: DocumentId,
        expected: DocumentState,
    },
    /// No document anywhere carries this number.
    NumberFree { number: String },
    /// No document in the family carries this version.
    VersionFree {
        family_id: FamilyId,
        version: VersionNumber,
    },
    /// No workflow on any document of the family is open.
    NoOpenWorkflowInFamily { family_id: FamilyId },
    /// No other document holds a live, active dependency on this one.
    NoActiveDependents { document_id: DocumentId },
}

/// One row mutation inside a commit.
#[derive(Clone, Debug)]
pub enum CommitWrite {
    InsertDocument(Document),
    UpdateDocument(Document),
    InsertWorkflow(Workflow),
    /// The store bumps the row's revision counter on every update.
    UpdateWorkflow(Workflow),
    AppendTransition(Transition),
}

/// A guarded, all-or-nothing unit of mutation.
#[derive(Clone, Debug, Default)]
pub struct CommitRequest {
    pub guards: Vec<CommitGuard>,
    pub writes: Vec<CommitWrite>,
    pub side_effects: Vec<SideEffect>,
}

impl CommitRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guard(mut self, guard: CommitGuard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn with_write(mut self, write: CommitWrite) -> Self {
        self.writes.push(write);
        self
    }

    pub fn with_side_effect(mut self, effect: SideEffect) -> Self {
        self.side_effects.push(effect);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.side_effects.is_empty()
    }
}

/// One persisted side effect awaiting delivery.
///
/// Entries stay in the outbox until completed, so an interrupted drain
/// redelivers them: at-least-once, never lost with the commit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Unique entry identifier
    pub id: String,
    /// The deferred effect
    pub effect: SideEffect,
    /// When the owning commit was applied
    pub enqueued_at: DateTime<Utc>,
    /// How many times a drain has claimed this entry
    pub attempts: u32,
}

impl OutboxEntry {
    pub fn new(effect: SideEffect, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("outbox-{}", uuid::Uuid::new_v4()),
            effect,
            enqueued_at,
            attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_types::{ActorId, Notification, NotificationCategory};

    #[test]
    fn test_request_builder() {
        let request = CommitRequest::new()
            .with_guard(CommitGuard::NumberFree {
                number: "SOP-014-v01.01".to_string(),
            })
            .with_side_effect(SideEffect::Notify(Notification::new(
                vec![ActorId::new("bob")],
                "Review requested",
                "SOP-014 is ready for review",
                NotificationCategory::ReviewRequested,
            )));

        assert_eq!(request.guards.len(), 1);
        assert!(request.writes.is_empty());
        assert!(!request.is_empty());
    }

    #[test]
    fn test_outbox_entry_ids_are_unique() {
        let now = Utc::now();
        let effect = SideEffect::Notify(Notification::new(
            vec![ActorId::new("bob")],
            "s",
            "b",
            NotificationCategory::ReviewRequested,
        ));
        let first = OutboxEntry::new(effect.clone(), now);
        let second = OutboxEntry::new(effect, now);
        assert_ne!(first.id, second.id);
        assert_eq!(first.attempts, 0);
    }
}
