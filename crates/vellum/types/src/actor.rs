//! Actors and access levels
//!
//! Identity and permissions come from an external directory; the engine only
//! ever asks "does this actor hold level >= X" and "is this actor the
//! assigned role holder". Levels are ordered so those checks are plain
//! comparisons.

use serde::{Deserialize, Serialize};

/// Unique identifier for an actor (author, reviewer, approver, system).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
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

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered permission tiers for the document control module.
///
/// `Admin` carries the superuser override: it bypasses segregation-of-duties
/// checks but never bypasses state preconditions.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    #[default]
    ReadOnly,
    Contributor,
    Approver,
    Admin,
}

impl AccessLevel {
    /// Whether this level satisfies a required minimum.
    pub fn permits(&self, required: AccessLevel) -> bool {
        *self >= required
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AccessLevel::ReadOnly => "READ_ONLY",
            AccessLevel::Contributor => "CONTRIBUTOR",
            AccessLevel::Approver => "APPROVER",
            AccessLevel::Admin => "ADMIN",
        };
        write!(f, "{}", label)
    }
}

/// An authenticated actor as resolved by the identity provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Actor {
    /// Stable identity reference
    pub id: ActorId,
    /// Display name for notifications and audit rendering
    pub name: String,
    /// Permission tier within the document control module
    pub level: AccessLevel,
}

impl Actor {
    pub fn new(id: ActorId, name: impl Into<String>, level: AccessLevel) -> Self {
        Self {
            id,
            name: name.into(),
            level,
        }
    }

    /// Superuser override used by segregation-of-duties checks.
    pub fn is_admin(&self) -> bool {
        self.level == AccessLevel::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_id() {
        let id = ActorId::generate();
        assert!(!id.0.is_empty());
        let named = ActorId::new("alice");
        assert_eq!(format!("{}", named), "alice");
        assert_eq!(named.short(), "alice");
    }

    #[test]
    fn test_short_id_char_boundaries() {
        assert_eq!(ActorId::new("björn-østergaard").short(), "björn-øs");
        assert_eq!(ActorId::new("ab").short(), "ab");
    }

    #[test]
    fn test_level_ordering() {
        assert!(AccessLevel::Admin.permits(AccessLevel::Approver));
        assert!(AccessLevel::Approver.permits(AccessLevel::Contributor));
        assert!(!AccessLevel::Contributor.permits(AccessLevel::Approver));
        assert!(!AccessLevel::ReadOnly.permits(AccessLevel::Contributor));
    }

    #[test]
    fn test_admin_flag() {
        let admin = Actor::new(ActorId::new("root"), "Root", AccessLevel::Admin);
        let author = Actor::new(ActorId::new("alice"), "Alice", AccessLevel::Contributor);
        assert!(admin.is_admin());
        assert!(!author.is_admin());
    }
}
