//! Sensitivity classification tiers
//!
//! A document carries one tiered confidentiality label. New versions inherit
//! the parent's label; every approval must either confirm the current label
//! or change it with a recorded reason.

use serde::{Deserialize, Serialize};

/// Tiered confidentiality label, lowest to highest.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensitivityLabel {
    Public,
    Internal,
    Confidential,
    Restricted,
}

impl SensitivityLabel {
    pub fn all() -> [SensitivityLabel; 4] {
        [
            SensitivityLabel::Public,
            SensitivityLabel::Internal,
            SensitivityLabel::Confidential,
            SensitivityLabel::Restricted,
        ]
    }

    pub fn code(&self) -> &'static str {
        match self {
            SensitivityLabel::Public => "PUBLIC",
            SensitivityLabel::Internal => "INTERNAL",
            SensitivityLabel::Confidential => "CONFIDENTIAL",
            SensitivityLabel::Restricted => "RESTRICTED",
        }
    }
}

impl std::fmt::Display for SensitivityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Outcome of resolving the label supplied at approval time against the
/// document's current label.
///
/// `Changed` is the only variant that demands a reason, and it is audited as
/// a discrete event separate from the state transition itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensitivityResolution {
    /// First classification of a never-labeled document.
    Initial { label: SensitivityLabel },
    /// Approval re-affirmed the current label.
    Confirmed { label: SensitivityLabel },
    /// Approval moved the document to a different tier.
    Changed {
        previous: SensitivityLabel,
        next: SensitivityLabel,
        reason: String,
    },
}

impl SensitivityResolution {
    /// The label the document ends up with.
    pub fn label(&self) -> SensitivityLabel {
        match self {
            SensitivityResolution::Initial { label } => *label,
            SensitivityResolution::Confirmed { label } => *label,
            SensitivityResolution::Changed { next, .. } => *next,
        }
    }

    pub fn is_change(&self) -> bool {
        matches!(self, SensitivityResolution::Changed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(SensitivityLabel::Restricted > SensitivityLabel::Confidential);
        assert!(SensitivityLabel::Internal > SensitivityLabel::Public);
    }

    #[test]
    fn test_resolution_label() {
        let changed = SensitivityResolution::Changed {
            previous: SensitivityLabel::Internal,
            next: SensitivityLabel::Confidential,
            reason: "contains supplier pricing".to_string(),
        };
        assert_eq!(changed.label(), SensitivityLabel::Confidential);
        assert!(changed.is_change());

        let confirmed = SensitivityResolution::Confirmed {
            label: SensitivityLabel::Internal,
        };
        assert_eq!(confirmed.label(), SensitivityLabel::Internal);
        assert!(!confirmed.is_change());
    }
}
