//! Document dependencies and obsolescence blockers
//!
//! A dependency is a directed edge "A depends on B". Retiring B is blocked
//! while any active dependent of B is still alive, while a newer family
//! sibling is in development, or while any workflow in the family is open.
//! Blockers are always reported as a structured list, never a bare refusal.

use crate::{DocumentId, DocumentState, WorkflowKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a dependency edge.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyId(pub String);

impl DependencyId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for DependencyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Directed edge: `document_id` depends on `depends_on`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentDependency {
    /// Unique identifier
    pub id: DependencyId,
    /// The dependent document
    pub document_id: DocumentId,
    /// The document being depended on
    pub depends_on: DocumentId,
    /// Critical edges are surfaced first in blocker lists
    pub is_critical: bool,
    /// Inactive edges are ignored by eligibility checks
    pub active: bool,
    /// When the edge was declared
    pub created_at: DateTime<Utc>,
}

impl DocumentDependency {
    pub fn new(document_id: DocumentId, depends_on: DocumentId) -> Self {
        Self {
            id: DependencyId::generate(),
            document_id,
            depends_on,
            is_critical: false,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn critical(mut self) -> Self {
        self.is_critical = true;
        self
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// One document standing in the way of an obsolescence request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockerRef {
    pub document_id: DocumentId,
    /// Full document number, for actionable error messages
    pub number: String,
    pub status: DocumentState,
}

impl std::fmt::Display for BlockerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.number, self.status)
    }
}

/// An open workflow standing in the way of an obsolescence request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowBlockerRef {
    pub document_id: DocumentId,
    pub number: String,
    pub kind: WorkflowKind,
    pub state: DocumentState,
}

impl std::fmt::Display for WorkflowBlockerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} workflow, {})", self.number, self.kind, self.state)
    }
}

/// The full, categorized set of conditions blocking an obsolescence.
///
/// The check is conjunctive: any non-empty category blocks the operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObsolescenceBlockers {
    /// Other documents whose active dependency on this one is still alive
    pub dependents: Vec<BlockerRef>,
    /// Higher-versioned family siblings still in development
    pub in_development: Vec<BlockerRef>,
    /// Open workflows anywhere in the family
    pub open_workflows: Vec<WorkflowBlockerRef>,
}

impl ObsolescenceBlockers {
    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
            && self.in_development.is_empty()
            && self.open_workflows.is_empty()
    }

    pub fn total(&self) -> usize {
        self.dependents.len() + self.in_development.len() + self.open_workflows.len()
    }
}

impl std::fmt::Display for ObsolescenceBlockers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if !self.dependents.is_empty() {
            let list = self
                .dependents
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("{} active dependent(s): {}", self.dependents.len(), list));
        }
        if !self.in_development.is_empty() {
            let list = self
                .in_development
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!(
                "{} newer version(s) in development: {}",
                self.in_development.len(),
                list
            ));
        }
        if !self.open_workflows.is_empty() {
            let list = self
                .open_workflows
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!(
                "{} open workflow(s) in family: {}",
                self.open_workflows.len(),
                list
            ));
        }
        write!(f, "{}", parts.join("; "))
    }
}
