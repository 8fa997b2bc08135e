//! Typed ID wrappers.
//!
//! Every clip instance (including split children and clones) gets its own
//! [`ClipId`] so log lines from concurrently driven clips can be told apart.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a clip instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(Uuid);

impl ClipId {
    /// Generate a new random clip ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ClipId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ClipId> for Uuid {
    fn from(id: ClipId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ClipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_id_unique() {
        assert_ne!(ClipId::new(), ClipId::new());
    }

    #[test]
    fn test_clip_id_uuid_round_trip() {
        let uuid = Uuid::new_v4();
        let id = ClipId::from(uuid);
        assert_eq!(Uuid::from(id), uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn test_clip_id_serializes_transparently() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&ClipId::from(uuid)).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }
}
