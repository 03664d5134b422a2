//! Outbox drain worker
//!
//! Side effects are committed as outbox rows alongside the transition that
//! caused them. This worker claims pending rows, hands them to the
//! notification dispatcher or the task board, and completes only what was
//! delivered. Failed rows stay pending and are redelivered on the next
//! drain: at-least-once, and never blocking the transition that enqueued
//! them.

use crate::ports::{NotificationDispatcher, TaskBoard};
use std::sync::Arc;
use vellum_store::{DocumentStore, OutboxEntry};
use vellum_types::{LifecycleResult, SideEffect};

const DEFAULT_BATCH_SIZE: usize = 32;

/// What one drain pass accomplished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    pub delivered: usize,
    pub failed: usize,
}

pub struct OutboxWorker {
    store: Arc<dyn DocumentStore>,
    notifications: Arc<dyn NotificationDispatcher>,
    tasks: Arc<dyn TaskBoard>,
    batch_size: usize,
}

impl OutboxWorker {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        notifications: Arc<dyn NotificationDispatcher>,
        tasks: Arc<dyn TaskBoard>,
    ) -> Self {
        Self {
            store,
            notifications,
            tasks,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Claims and delivers pending side effects until the outbox is empty or
    /// a batch sees a failure. Failed entries stay pending for redelivery.
    pub async fn drain(&self) -> LifecycleResult<DrainOutcome> {
        let mut outcome = DrainOutcome::default();
        loop {
            let batch = self.store.claim_outbox(self.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            let mut batch_failed = false;
            for entry in batch {
                match self.deliver(&entry).await {
                    Ok(()) => {
                        self.store.complete_outbox(&entry.id).await?;
                        outcome.delivered += 1;
                    }
                    Err(err) => {
                        tracing::warn!(
                            entry_id = %entry.id,
                            attempts = entry.attempts,
                            error = %err,
                            "Side effect delivery failed, leaving pending"
                        );
                        outcome.failed += 1;
                        batch_failed = true;
                    }
                }
            }
            if batch_failed {
                break;
            }
        }
        if outcome.delivered > 0 || outcome.failed > 0 {
            tracing::debug!(
                delivered = outcome.delivered,
                failed = outcome.failed,
                "Outbox drain finished"
            );
        }
        Ok(outcome)
    }

    async fn deliver(&self, entry: &OutboxEntry) -> LifecycleResult<()> {
        match &entry.effect {
            SideEffect::Notify(notification) => {
                self.notifications.dispatch(notification.clone()).await
            }
            SideEffect::Task(directive) => self.tasks.apply(directive.clone()).await,
        }
    }
}
