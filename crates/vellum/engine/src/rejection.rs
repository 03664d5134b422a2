//! Rejection history and reassignment advice
//!
//! The history is reconstructed from the transition log: every transition
//! landing on `Draft` with a rejection payload is one event, classified by
//! the payload variant alone. Comment text is carried verbatim for display
//! and never parsed. The advice favors continuity: the people who already
//! rejected a draft carry its context, so they are suggested again rather
//! than excluded.

use chrono::{DateTime, Utc};
use vellum_types::{ActorId, Document, RejectionKind, Transition, TransitionData, WorkflowId};

/// One rejection, as reconstructed from the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectionEvent {
    pub kind: RejectionKind,
    pub rejected_by: ActorId,
    pub occurred_at: DateTime<Utc>,
    pub comment: Option<String>,
    /// Assignees cleared by the rejection.
    pub previous_assignees: Vec<ActorId>,
    pub workflow_id: WorkflowId,
}

/// Chronological rejection timeline for one document, across all of its
/// workflows.
#[derive(Clone, Debug, Default)]
pub struct RejectionHistory {
    events: Vec<RejectionEvent>,
}

impl RejectionHistory {
    /// Builds the history from a document's transition log. Order of the
    /// input does not matter; events come out oldest first.
    pub fn from_transitions(transitions: &[Transition]) -> Self {
        let mut events: Vec<RejectionEvent> = transitions
            .iter()
            .filter_map(|transition| {
                let kind = transition.rejection_kind()?;
                let previous_assignees = match &transition.data {
                    TransitionData::Rejection {
                        previous_assignees, ..
                    } => previous_assignees.clone(),
                    _ => Vec::new(),
                };
                Some(RejectionEvent {
                    kind,
                    rejected_by: transition.actor.clone(),
                    occurred_at: transition.occurred_at,
                    comment: transition.comment.clone(),
                    previous_assignees,
                    workflow_id: transition.workflow_id.clone(),
                })
            })
            .collect();
        events.sort_by_key(|event| event.occurred_at);
        Self { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[RejectionEvent] {
        &self.events
    }

    pub fn latest(&self) -> Option<&RejectionEvent> {
        self.events.last()
    }

    /// Reviewers who have rejected, oldest first, deduplicated.
    pub fn rejecting_reviewers(&self) -> Vec<ActorId> {
        self.rejectors(RejectionKind::Review)
    }

    /// Approvers who have rejected, oldest first, deduplicated.
    pub fn rejecting_approvers(&self) -> Vec<ActorId> {
        self.rejectors(RejectionKind::Approval)
    }

    fn rejectors(&self, kind: RejectionKind) -> Vec<ActorId> {
        let mut seen = Vec::new();
        for event in self.events.iter().filter(|e| e.kind == kind) {
            if !seen.contains(&event.rejected_by) {
                seen.push(event.rejected_by.clone());
            }
        }
        seen
    }

    fn latest_of(&self, kind: RejectionKind) -> Option<&RejectionEvent> {
        self.events.iter().rev().find(|e| e.kind == kind)
    }

    /// Suggests who should take the next review and approval round.
    ///
    /// Current assignments win; where a rejection cleared an assignment, the
    /// most recent rejector of that kind is suggested again, with the
    /// rejection context attached through the history itself.
    pub fn advise(&self, document: &Document) -> ReassignmentAdvice {
        let prior_review_rejections =
            self.events.iter().filter(|e| e.kind == RejectionKind::Review).count();
        let prior_approval_rejections = self.len() - prior_review_rejections;

        let suggested_reviewer = document
            .reviewer
            .clone()
            .or_else(|| self.latest_of(RejectionKind::Review).map(|e| e.rejected_by.clone()));
        let suggested_approver = document
            .approver
            .clone()
            .or_else(|| self.latest_of(RejectionKind::Approval).map(|e| e.rejected_by.clone()));

        let rationale = if self.is_empty() {
            "no prior rejections on this document".to_string()
        } else {
            format!(
                "{} prior rejection(s); suggesting prior participants so review context carries over",
                self.len()
            )
        };

        ReassignmentAdvice {
            suggested_reviewer,
            suggested_approver,
            prior_review_rejections,
            prior_approval_rejections,
            rationale,
        }
    }
}

/// Continuity-first suggestion for the next round of assignments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReassignmentAdvice {
    pub suggested_reviewer: Option<ActorId>,
    pub suggested_approver: Option<ActorId>,
    pub prior_review_rejections: usize,
    pub prior_approval_rejections: usize,
    pub rationale: String,
}
