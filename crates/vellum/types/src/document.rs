//! Controlled documents
//!
//! A document is the versioned artifact under control. Versions of the same
//! document share a stable `FamilyId`; relation between versions is decided
//! by that identifier alone, never by matching number prefixes.

use crate::{ActorId, DocumentState, SensitivityLabel};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for one document version.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
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

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier shared by every version of one document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FamilyId(pub String);

impl FamilyId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for FamilyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Major/minor version pair, each component bounded 0..=99.
///
/// Ordering is lexicographic on (major, minor), which matches lifecycle
/// ordering within a family.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VersionNumber {
    pub major: u32,
    pub minor: u32,
}

impl VersionNumber {
    /// Inclusive upper bound for each component.
    pub const COMPONENT_MAX: u32 = 99;

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// The first version assigned to a brand-new family.
    pub fn initial() -> Self {
        Self::new(1, 0)
    }

    /// Zero-padded tag embedded in document numbers, e.g. `v02.01`.
    pub fn tag(&self) -> String {
        format!("v{:02}.{:02}", self.major, self.minor)
    }

    pub fn within_bounds(&self) -> bool {
        self.major <= Self::COMPONENT_MAX && self.minor <= Self::COMPONENT_MAX
    }
}

impl std::fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The versioned artifact under lifecycle control.
///
/// `status` mirrors the state of the workflow currently driving the
/// document; `number` is globally unique and encodes the version tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier for this version
    pub id: DocumentId,
    /// Stable identifier shared across versions
    pub family_id: FamilyId,
    /// Version-independent number root, e.g. `SOP-014`
    pub base_number: String,
    /// Full document number, e.g. `SOP-014-v02.01`; globally unique
    pub number: String,
    /// Title shown in catalogs and notifications
    pub title: String,
    /// Current lifecycle status
    pub status: DocumentState,
    /// Major/minor version within the family
    pub version: VersionNumber,
    /// The actor who owns the content
    pub author: ActorId,
    /// Assigned reviewer, cleared on rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<ActorId>,
    /// Assigned approver, cleared on approval rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver: Option<ActorId>,
    /// Current confidentiality tier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<SensitivityLabel>,
    /// Who last set or confirmed the label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity_set_by: Option<ActorId>,
    /// When the label was last set or confirmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity_set_at: Option<DateTime<Utc>>,
    /// Parent version the label was inherited from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity_inherited_from: Option<DocumentId>,
    /// Date the document took (or will take) effect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
    /// Date the document was (or will be) retired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obsolete_date: Option<NaiveDate>,
    /// Why the document is being retired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obsolescence_reason: Option<String>,
    /// The prior version this one replaces upon taking effect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<DocumentId>,
    /// When this version was created
    pub created_at: DateTime<Utc>,
    /// When this version was last mutated
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a brand-new draft at version 1.0.
    pub fn new(
        family_id: FamilyId,
        base_number: impl Into<String>,
        title: impl Into<String>,
        author: ActorId,
    ) -> Self {
        let base_number = base_number.into();
        let version = VersionNumber::initial();
        let number = format!("{}-{}", base_number, version.tag());
        let now = Utc::now();
        Self {
            id: DocumentId::generate(),
            family_id,
            base_number,
            number,
            title: title.into(),
            status: DocumentState::Draft,
            version,
            author,
            reviewer: None,
            approver: None,
            sensitivity: None,
            sensitivity_set_by: None,
            sensitivity_set_at: None,
            sensitivity_inherited_from: None,
            effective_date: None,
            obsolete_date: None,
            obsolescence_reason: None,
            supersedes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: DocumentId) -> Self {
        self.id = id;
        self
    }

    pub fn with_reviewer(mut self, reviewer: ActorId) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn with_approver(mut self, approver: ActorId) -> Self {
        self.approver = Some(approver);
        self
    }

    pub fn with_sensitivity(mut self, label: SensitivityLabel) -> Self {
        self.sensitivity = Some(label);
        self
    }

    /// Version comparison within the same family.
    pub fn is_newer_than(&self, other: &Document) -> bool {
        self.family_id == other.family_id && self.version > other.version
    }
}
