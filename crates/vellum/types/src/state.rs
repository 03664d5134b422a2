//! Lifecycle states for controlled documents
//!
//! The state catalog is fixed: states and their legal edges are code, not
//! user data. The adjacency itself lives in the engine's `StateRegistry`;
//! this module only defines the nodes and their terminality semantics.

use serde::{Deserialize, Serialize};

/// One node in the document lifecycle.
///
/// Serialized in the catalog's wire form (`DRAFT`, `PENDING_REVIEW`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentState {
    Draft,
    PendingReview,
    UnderReview,
    ReviewCompleted,
    PendingApproval,
    ApprovedPendingEffective,
    Effective,
    Superseded,
    ScheduledForObsolescence,
    Obsolete,
    Terminated,
}

impl DocumentState {
    /// Every state, in lifecycle order.
    pub fn all() -> [DocumentState; 11] {
        [
            DocumentState::Draft,
            DocumentState::PendingReview,
            DocumentState::UnderReview,
            DocumentState::ReviewCompleted,
            DocumentState::PendingApproval,
            DocumentState::ApprovedPendingEffective,
            DocumentState::Effective,
            DocumentState::Superseded,
            DocumentState::ScheduledForObsolescence,
            DocumentState::Obsolete,
            DocumentState::Terminated,
        ]
    }

    /// The catalog code, as stored and audited.
    pub fn code(&self) -> &'static str {
        match self {
            DocumentState::Draft => "DRAFT",
            DocumentState::PendingReview => "PENDING_REVIEW",
            DocumentState::UnderReview => "UNDER_REVIEW",
            DocumentState::ReviewCompleted => "REVIEW_COMPLETED",
            DocumentState::PendingApproval => "PENDING_APPROVAL",
            DocumentState::ApprovedPendingEffective => "APPROVED_PENDING_EFFECTIVE",
            DocumentState::Effective => "EFFECTIVE",
            DocumentState::Superseded => "SUPERSEDED",
            DocumentState::ScheduledForObsolescence => "SCHEDULED_FOR_OBSOLESCENCE",
            DocumentState::Obsolete => "OBSOLETE",
            DocumentState::Terminated => "TERMINATED",
        }
    }

    /// Human-readable name for catalog rendering.
    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentState::Draft => "Draft",
            DocumentState::PendingReview => "Pending Review",
            DocumentState::UnderReview => "Under Review",
            DocumentState::ReviewCompleted => "Review Completed",
            DocumentState::PendingApproval => "Pending Approval",
            DocumentState::ApprovedPendingEffective => "Approved (Pending Effective)",
            DocumentState::Effective => "Effective",
            DocumentState::Superseded => "Superseded",
            DocumentState::ScheduledForObsolescence => "Scheduled for Obsolescence",
            DocumentState::Obsolete => "Obsolete",
            DocumentState::Terminated => "Terminated",
        }
    }

    /// True for the state new documents start in.
    pub fn is_initial(&self) -> bool {
        matches!(self, DocumentState::Draft)
    }

    /// Hard-terminal for the document: no outgoing edges, ever.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocumentState::Superseded | DocumentState::Obsolete | DocumentState::Terminated
        )
    }

    /// Terminal for the workflow that produced it, while the document itself
    /// can still leave via supersession or obsolescence.
    pub fn is_resting(&self) -> bool {
        matches!(self, DocumentState::Effective)
    }

    /// A workflow sitting in this state is closed and will never move again.
    pub fn closes_workflow(&self) -> bool {
        self.is_terminal() || self.is_resting()
    }

    /// States counted as "in development" for obsolescence eligibility:
    /// anything between draft and approval that has not yet taken effect.
    pub fn is_in_development(&self) -> bool {
        matches!(
            self,
            DocumentState::Draft
                | DocumentState::PendingReview
                | DocumentState::UnderReview
                | DocumentState::ReviewCompleted
                | DocumentState::PendingApproval
                | DocumentState::ApprovedPendingEffective
        )
    }
}

impl std::fmt::Display for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminality_partitions() {
        for state in DocumentState::all() {
            if state.is_terminal() {
                assert!(state.closes_workflow());
                assert!(!state.is_resting());
            }
            if state.is_resting() {
                assert!(state.closes_workflow());
                assert!(!state.is_terminal());
            }
        }
        assert!(DocumentState::Effective.is_resting());
        assert!(!DocumentState::Effective.is_terminal());
        assert!(DocumentState::Terminated.is_terminal());
    }

    #[test]
    fn test_wire_codes_round_trip() {
        for state in DocumentState::all() {
            let encoded = serde_json::to_string(&state).unwrap();
            assert_eq!(encoded, format!("\"{}\"", state.code()));
            let decoded: DocumentState = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, state);
        }
    }

    #[test]
    fn test_in_development_excludes_effective_and_terminals() {
        assert!(DocumentState::Draft.is_in_development());
        assert!(DocumentState::ApprovedPendingEffective.is_in_development());
        assert!(!DocumentState::Effective.is_in_development());
        assert!(!DocumentState::Superseded.is_in_development());
        assert!(!DocumentState::Terminated.is_in_development());
    }
}
