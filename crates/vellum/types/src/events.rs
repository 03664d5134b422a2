//! Audit events and post-commit side effects
//!
//! Every operation emits its audit events explicitly in its outcome; side
//! effects (notifications, assignee tasks) are written to the store's outbox
//! in the same commit as the transition and drained afterwards. Nothing is
//! triggered implicitly from persistence hooks.

use crate::{ActorId, DocumentId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an audit event records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A workflow state changed.
    StateChanged,
    /// Approval re-affirmed the current sensitivity label.
    SensitivityConfirmed,
    /// Approval moved the document to a different sensitivity tier.
    SensitivityChanged,
    /// A new document version was created.
    DocumentCreated,
    /// A prior version was replaced by a newly effective one.
    DocumentSuperseded,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AuditAction::StateChanged => "state_changed",
            AuditAction::SensitivityConfirmed => "sensitivity_confirmed",
            AuditAction::SensitivityChanged => "sensitivity_changed",
            AuditAction::DocumentCreated => "document_created",
            AuditAction::DocumentSuperseded => "document_superseded",
        };
        write!(f, "{}", label)
    }
}

/// One append-only audit record handed to the sink.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier
    pub event_id: String,
    /// Action kind
    pub action: AuditAction,
    /// Who acted
    pub actor: ActorId,
    /// The document the event is about
    pub document_id: DocumentId,
    /// The workflow involved, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    /// Value before the change, in wire form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// Value after the change, in wire form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// When the event occurred
    pub occurred_at: DateTime<Utc>,
    /// Free-form context (comments, reasons, version tags)
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub fn new(action: AuditAction, actor: ActorId, document_id: DocumentId) -> Self {
        Self {
            event_id: format!("audit-{}", uuid::Uuid::new_v4()),
            action,
            actor,
            document_id,
            workflow_id: None,
            before: None,
            after: None,
            occurred_at: Utc::now(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_workflow(mut self, workflow_id: WorkflowId) -> Self {
        self.workflow_id = Some(workflow_id);
        self
    }

    pub fn with_change(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.before = Some(before.into());
        self.after = Some(after.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Category a notification is filed under, for recipient-side filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    ReviewRequested,
    ReviewCompleted,
    ApprovalRequested,
    DocumentRejected,
    DocumentApproved,
    DocumentEffective,
    DocumentSuperseded,
    WorkflowTerminated,
    ObsolescenceScheduled,
    DocumentObsoleted,
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NotificationCategory::ReviewRequested => "review_requested",
            NotificationCategory::ReviewCompleted => "review_completed",
            NotificationCategory::ApprovalRequested => "approval_requested",
            NotificationCategory::DocumentRejected => "document_rejected",
            NotificationCategory::DocumentApproved => "document_approved",
            NotificationCategory::DocumentEffective => "document_effective",
            NotificationCategory::DocumentSuperseded => "document_superseded",
            NotificationCategory::WorkflowTerminated => "workflow_terminated",
            NotificationCategory::ObsolescenceScheduled => "obsolescence_scheduled",
            NotificationCategory::DocumentObsoleted => "document_obsoleted",
        };
        write!(f, "{}", label)
    }
}

/// Outbound message handed to the dispatcher, best-effort.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipients: Vec<ActorId>,
    pub subject: String,
    pub body: String,
    pub category: NotificationCategory,
}

impl Notification {
    pub fn new(
        recipients: Vec<ActorId>,
        subject: impl Into<String>,
        body: impl Into<String>,
        category: NotificationCategory,
    ) -> Self {
        Self {
            recipients,
            subject: subject.into(),
            body: body.into(),
            category,
        }
    }
}

/// Kind of derived assignee task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Review,
    Approval,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskKind::Review => "review",
            TaskKind::Approval => "approval",
        };
        write!(f, "{}", label)
    }
}

/// Instruction for the task board: open a task for an assignee or close one.
///
/// The key is deterministic per (kind, workflow) so an open and its matching
/// close always refer to the same task, and closing an absent task is a
/// harmless no-op.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskDirective {
    Open {
        key: String,
        kind: TaskKind,
        document_id: DocumentId,
        assignee: ActorId,
    },
    Close {
        key: String,
    },
}

impl TaskDirective {
    pub fn open(
        kind: TaskKind,
        document_id: DocumentId,
        workflow_id: &WorkflowId,
        assignee: ActorId,
    ) -> Self {
        TaskDirective::Open {
            key: Self::key(kind, workflow_id),
            kind,
            document_id,
            assignee,
        }
    }

    pub fn close(kind: TaskKind, workflow_id: &WorkflowId) -> Self {
        TaskDirective::Close {
            key: Self::key(kind, workflow_id),
        }
    }

    pub fn key(kind: TaskKind, workflow_id: &WorkflowId) -> String {
        format!("{}:{}", kind, workflow_id)
    }
}

/// One deferred side effect, persisted with the commit and drained after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideEffect {
    Notify(Notification),
    Task(TaskDirective),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_builder() {
        let event = AuditEvent::new(
            AuditAction::StateChanged,
            ActorId::new("alice"),
            DocumentId::new("doc-1"),
        )
        .with_workflow(WorkflowId::new("wf-1"))
        .with_change("DRAFT", "PENDING_REVIEW")
        .with_metadata(serde_json::json!({"comment": "ready"}));

        assert!(event.event_id.starts_with("audit-"));
        assert_eq!(event.before.as_deref(), Some("DRAFT"));
        assert_eq!(event.after.as_deref(), Some("PENDING_REVIEW"));
        assert_eq!(event.metadata["comment"], "ready");
    }

    #[test]
    fn test_task_keys_pair_open_and_close() {
        let workflow_id = WorkflowId::new("wf-9");
        let open = TaskDirective::open(
            TaskKind::Review,
            DocumentId::new("doc-1"),
            &workflow_id,
            ActorId::new("bob"),
        );
        let close = TaskDirective::close(TaskKind::Review, &workflow_id);

        let open_key = match &open {
            TaskDirective::Open { key, .. } => key.clone(),
            _ => unreachable!(),
        };
        let close_key = match &close {
            TaskDirective::Close { key } => key.clone(),
            _ => unreachable!(),
        };
        assert_eq!(open_key, close_key);
        assert_eq!(open_key, "review:wf-9");
    }

    #[test]
    fn test_action_labels() {
        assert_eq!(AuditAction::SensitivityChanged.to_string(), "sensitivity_changed");
        assert_eq!(
            NotificationCategory::ApprovalRequested.to_string(),
            "approval_requested"
        );
    }
}
