//! Error types for the document lifecycle

use crate::{DocumentId, DocumentState, ObsolescenceBlockers, WorkflowId};

/// Errors returned by lifecycle operations.
///
/// Everything except `Storage` is a recoverable business-rule failure meant
/// to be rendered to the caller with its specific blocking condition.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Obsolescence blocked: {blockers}")]
    DependencyBlocked { blockers: ObsolescenceBlockers },

    #[error("Numbering exhausted: {0}")]
    NumberingExhausted(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("No active workflow for document: {0}")]
    NoActiveWorkflow(DocumentId),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl LifecycleError {
    /// Convenience constructor for missing-edge failures.
    pub fn no_edge(from: DocumentState, to: DocumentState) -> Self {
        LifecycleError::InvalidTransition(format!("no edge {} -> {}", from, to))
    }

    /// Whether the caller can fix this by changing input or state, as
    /// opposed to an infrastructure fault.
    pub fn is_business_rule(&self) -> bool {
        !matches!(self, LifecycleError::Storage(_))
    }
}

/// Result type alias for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockerRef;

    #[test]
    fn test_no_edge_message() {
        let err = LifecycleError::no_edge(DocumentState::Draft, DocumentState::Effective);
        assert_eq!(err.to_string(), "Invalid transition: no edge DRAFT -> EFFECTIVE");
    }

    #[test]
    fn test_blocked_error_names_documents() {
        let err = LifecycleError::DependencyBlocked {
            blockers: ObsolescenceBlockers {
                dependents: vec![BlockerRef {
                    document_id: DocumentId::new("e"),
                    number: "SOP-020-v01.00".to_string(),
                    status: DocumentState::Effective,
                }],
                in_development: vec![],
                open_workflows: vec![],
            },
        };
        assert!(err.to_string().contains("SOP-020-v01.00"));
        assert!(err.is_business_rule());
    }

    #[test]
    fn test_storage_is_not_business_rule() {
        assert!(!LifecycleError::Storage("connection lost".to_string()).is_business_rule());
    }
}
