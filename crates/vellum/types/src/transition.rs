//! Transition records
//!
//! One immutable record per state change. The payload is a closed set of
//! typed variants; rejection classification reads the variant, never the
//! comment text. A workflow's current state always equals the `to_state` of
//! its most recent transition.

use crate::{ActorId, DocumentId, DocumentState, SensitivityLabel, WorkflowId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a transition record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub String);

impl TransitionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which gate a rejection came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Review,
    Approval,
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RejectionKind::Review => "review",
            RejectionKind::Approval => "approval",
        };
        write!(f, "{}", label)
    }
}

/// Typed payload attached to a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TransitionData {
    /// Plain state change with no extra context.
    #[default]
    None,
    /// A reviewer or approver sent the document back to draft.
    Rejection {
        kind: RejectionKind,
        /// Assignees cleared by this rejection, kept for reassignment advice.
        previous_assignees: Vec<ActorId>,
    },
    /// Approval granted, either effective immediately or on a future date.
    Approval {
        effective_date: NaiveDate,
        sensitivity: SensitivityLabel,
    },
    /// The workflow was abandoned.
    Termination {
        reason: String,
        /// Status the document reverted to.
        reverted_to: DocumentState,
    },
    /// This version was replaced by a newly effective successor.
    Supersession { superseded_by: DocumentId },
    /// Retirement was scheduled for a future date.
    ObsolescenceSchedule { due: NaiveDate, reason: String },
}

/// One immutable state change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transition {
    /// Unique identifier
    pub id: TransitionId,
    /// The workflow this change belongs to
    pub workflow_id: WorkflowId,
    /// State before
    pub from_state: DocumentState,
    /// State after
    pub to_state: DocumentState,
    /// Who performed the change
    pub actor: ActorId,
    /// When it happened
    pub occurred_at: DateTime<Utc>,
    /// Free-form comment, preserved verbatim for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Typed payload
    pub data: TransitionData,
}

impl Transition {
    pub fn new(
        workflow_id: WorkflowId,
        from_state: DocumentState,
        to_state: DocumentState,
        actor: ActorId,
    ) -> Self {
        Self {
            id: TransitionId::generate(),
            workflow_id,
            from_state,
            to_state,
            actor,
            occurred_at: Utc::now(),
            comment: None,
            data: TransitionData::None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_data(mut self, data: TransitionData) -> Self {
        self.data = data;
        self
    }

    /// Whether this record is a rejection landing back on draft.
    pub fn rejection_kind(&self) -> Option<RejectionKind> {
        match &self.data {
            TransitionData::Rejection { kind, .. } if self.to_state == DocumentState::Draft => {
                Some(*kind)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_kind_requires_draft_landing() {
        let rejection = Transition::new(
            WorkflowId::generate(),
            DocumentState::UnderReview,
            DocumentState::Draft,
            ActorId::new("bob"),
        )
        .with_comment("fix section 3")
        .with_data(TransitionData::Rejection {
            kind: RejectionKind::Review,
            previous_assignees: vec![ActorId::new("bob")],
        });
        assert_eq!(rejection.rejection_kind(), Some(RejectionKind::Review));

        let plain = Transition::new(
            WorkflowId::generate(),
            DocumentState::Draft,
            DocumentState::PendingReview,
            ActorId::new("alice"),
        );
        assert_eq!(plain.rejection_kind(), None);
    }

    #[test]
    fn test_payload_round_trip() {
        let data = TransitionData::ObsolescenceSchedule {
            due: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            reason: "replaced by automated process".to_string(),
        };
        let encoded = serde_json::to_string(&data).unwrap();
        let decoded: TransitionData = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, data);
    }
}
