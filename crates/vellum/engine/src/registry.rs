//! State registry: the fixed lifecycle graph
//!
//! States and their legal edges are declared once here and consulted by
//! every transition attempt. An edge not in the registry is an invalid
//! transition, never silently allowed. The registry is owned by the
//! orchestrator's construction scope; there are no process-wide tables.

use std::collections::HashMap;
use vellum_types::{DocumentState, LifecycleError, LifecycleResult};

/// Catalog metadata for one state, for UI and API rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateInfo {
    pub state: DocumentState,
    pub code: &'static str,
    pub display_name: &'static str,
    pub is_initial: bool,
    pub is_final: bool,
}

/// The fixed lifecycle graph.
#[derive(Clone, Debug)]
pub struct StateRegistry {
    edges: HashMap<DocumentState, Vec<DocumentState>>,
}

impl StateRegistry {
    /// Build the catalog. The adjacency is the whole lifecycle contract:
    ///
    /// ```text
    /// DRAFT                      -> PENDING_REVIEW | TERMINATED
    /// PENDING_REVIEW             -> UNDER_REVIEW | TERMINATED
    /// UNDER_REVIEW               -> REVIEW_COMPLETED | DRAFT | TERMINATED
    /// REVIEW_COMPLETED           -> PENDING_APPROVAL | TERMINATED
    /// PENDING_APPROVAL           -> EFFECTIVE | APPROVED_PENDING_EFFECTIVE | DRAFT | TERMINATED
    /// APPROVED_PENDING_EFFECTIVE -> EFFECTIVE | TERMINATED
    /// EFFECTIVE                  -> SUPERSEDED | SCHEDULED_FOR_OBSOLESCENCE
    /// SCHEDULED_FOR_OBSOLESCENCE -> OBSOLETE | TERMINATED
    /// ```
    ///
    /// `SUPERSEDED`, `OBSOLETE`, and `TERMINATED` have no outgoing edges.
    pub fn new() -> Self {
        use DocumentState::*;
        let mut edges: HashMap<DocumentState, Vec<DocumentState>> = HashMap::new();
        edges.insert(Draft, vec![PendingReview, Terminated]);
        edges.insert(PendingReview, vec![UnderReview, Terminated]);
        edges.insert(UnderReview, vec![ReviewCompleted, Draft, Terminated]);
        edges.insert(ReviewCompleted, vec![PendingApproval, Terminated]);
        edges.insert(
            PendingApproval,
            vec![Effective, ApprovedPendingEffective, Draft, Terminated],
        );
        edges.insert(ApprovedPendingEffective, vec![Effective, Terminated]);
        edges.insert(Effective, vec![Superseded, ScheduledForObsolescence]);
        edges.insert(ScheduledForObsolescence, vec![Obsolete, Terminated]);
        edges.insert(Superseded, vec![]);
        edges.insert(Obsolete, vec![]);
        edges.insert(Terminated, vec![]);
        Self { edges }
    }

    /// Whether `from -> to` is a legal edge.
    pub fn can_transition(&self, from: DocumentState, to: DocumentState) -> bool {
        self.edges
            .get(&from)
            .map(|targets| targets.contains(&to))
            .unwrap_or(false)
    }

    /// Fail with `InvalidTransition` unless `from -> to` is legal.
    pub fn assert_edge(&self, from: DocumentState, to: DocumentState) -> LifecycleResult<()> {
        if self.can_transition(from, to) {
            Ok(())
        } else {
            tracing::debug!(from = %from, to = %to, "Rejected transition: edge not in registry");
            Err(LifecycleError::no_edge(from, to))
        }
    }

    /// Legal targets from one state.
    pub fn outgoing(&self, from: DocumentState) -> &[DocumentState] {
        self.edges.get(&from).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Full catalog in lifecycle order, for state pickers and docs.
    pub fn catalog(&self) -> Vec<StateInfo> {
        DocumentState::all()
            .into_iter()
            .map(|state| StateInfo {
                state,
                code: state.code(),
                display_name: state.display_name(),
                is_initial: state.is_initial(),
                is_final: self.outgoing(state).is_empty(),
            })
            .collect()
    }
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use DocumentState::*;

    #[test]
    fn test_happy_path_edges_exist() {
        let registry = StateRegistry::new();
        let path = [
            (Draft, PendingReview),
            (PendingReview, UnderReview),
            (UnderReview, ReviewCompleted),
            (ReviewCompleted, PendingApproval),
            (PendingApproval, Effective),
            (Effective, Superseded),
        ];
        for (from, to) in path {
            assert!(registry.can_transition(from, to), "{} -> {}", from, to);
        }
    }

    #[test]
    fn test_rejection_loops_return_to_draft() {
        let registry = StateRegistry::new();
        assert!(registry.can_transition(UnderReview, Draft));
        assert!(registry.can_transition(PendingApproval, Draft));
        assert!(!registry.can_transition(PendingReview, Draft));
    }

    #[test]
    fn test_terminals_have_no_exits() {
        let registry = StateRegistry::new();
        for state in [Superseded, Obsolete, Terminated] {
            assert!(registry.outgoing(state).is_empty());
        }
    }

    #[test]
    fn test_effective_is_final_for_workflow_but_not_document() {
        let registry = StateRegistry::new();
        assert!(registry.can_transition(Effective, Superseded));
        assert!(registry.can_transition(Effective, ScheduledForObsolescence));
        assert!(!registry.can_transition(Effective, Draft));
        assert!(!registry.can_transition(Effective, Terminated));
    }

    #[test]
    fn test_assert_edge_error_names_states() {
        let registry = StateRegistry::new();
        let err = registry.assert_edge(Draft, Effective).unwrap_err();
        assert!(err.to_string().contains("DRAFT -> EFFECTIVE"));
    }

    #[test]
    fn test_catalog_flags() {
        let registry = StateRegistry::new();
        let catalog = registry.catalog();
        assert_eq!(catalog.len(), 11);

        let draft = catalog.iter().find(|s| s.state == Draft).unwrap();
        assert!(draft.is_initial);
        assert!(!draft.is_final);

        let terminated = catalog.iter().find(|s| s.state == Terminated).unwrap();
        assert!(terminated.is_final);

        // Effective still has exits: supersession and obsolescence.
        let effective = catalog.iter().find(|s| s.state == Effective).unwrap();
        assert!(!effective.is_final);
    }

    fn any_state() -> impl Strategy<Value = DocumentState> {
        prop::sample::select(DocumentState::all().to_vec())
    }

    proptest! {
        #[test]
        fn property_edges_imply_open_source_state(from in any_state(), to in any_state()) {
            let registry = StateRegistry::new();
            if registry.can_transition(from, to) {
                // Hard terminals never transition out.
                prop_assert!(!from.is_terminal());
                // Self-loops are never legal.
                prop_assert!(from != to);
            } else {
                prop_assert!(registry.assert_edge(from, to).is_err());
            }
        }
    }
}
