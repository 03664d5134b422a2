//! Workflows
//!
//! A workflow drives one lifecycle episode of a document: its review cycle,
//! an up-versioning, a scheduled obsolescence, or a termination. It is
//! created when the episode starts, mutated on every transition, and kept
//! forever once closed.

use crate::{ActorId, DocumentId, DocumentState, RejectionKind};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a workflow.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Short prefix for log lines, truncated on a character boundary.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of lifecycle episode the workflow drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowKind {
    Review,
    UpVersion,
    Obsolete,
    Termination,
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            WorkflowKind::Review => "REVIEW",
            WorkflowKind::UpVersion => "UP_VERSION",
            WorkflowKind::Obsolete => "OBSOLETE",
            WorkflowKind::Termination => "TERMINATION",
        };
        write!(f, "{}", label)
    }
}

/// The most recent rejection recorded on a workflow, kept inline so the
/// recommendation engine and UI read it without scanning the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub kind: RejectionKind,
    pub rejected_by: ActorId,
    pub rejected_at: DateTime<Utc>,
    pub comment: String,
    /// Assignees cleared by the rejection.
    pub previous_assignees: Vec<ActorId>,
}

/// The stateful process object attached to one document episode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier
    pub id: WorkflowId,
    /// The document this workflow drives
    pub document_id: DocumentId,
    /// Episode kind
    pub kind: WorkflowKind,
    /// Current state; equals the document's status while the workflow is open
    pub state: DocumentState,
    /// Who must act next
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<ActorId>,
    /// Who opened the workflow
    pub initiated_by: ActorId,
    /// When the current step is due
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Optimistic-lock counter, bumped by the store on every update
    pub revision: u64,
    /// Most recent rejection, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_rejection: Option<RejectionRecord>,
    /// Free-form contextual data
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub context: HashMap<String, serde_json::Value>,
    /// When the workflow was opened
    pub created_at: DateTime<Utc>,
    /// When the workflow last changed
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(
        document_id: DocumentId,
        kind: WorkflowKind,
        state: DocumentState,
        initiated_by: ActorId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::generate(),
            document_id,
            kind,
            state,
            assignee: None,
            initiated_by,
            due_date: None,
            revision: 0,
            last_rejection: None,
            context: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_assignee(mut self, assignee: ActorId) -> Self {
        self.assignee = Some(assignee);
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Open means the workflow can still move; closed workflows are retained
    /// for audit but never mutated again.
    pub fn is_open(&self) -> bool {
        !self.state.closes_workflow()
    }

    /// Record a rejection on the workflow context.
    pub fn record_rejection(
        &mut self,
        kind: RejectionKind,
        rejected_by: ActorId,
        comment: impl Into<String>,
        previous_assignees: Vec<ActorId>,
    ) {
        self.last_rejection = Some(RejectionRecord {
            kind,
            rejected_by,
            rejected_at: Utc::now(),
            comment: comment.into(),
            previous_assignees,
        });
    }

    /// Whether the current step is past its due date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_open() && self.due_date.map(|d| d < today).unwrap_or(false)
    }
}
