//! Core type definitions shared by the container layer and the clip engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media track a clip can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Video track.
    Video,
    /// Audio track.
    Audio,
}

impl TrackKind {
    /// Both kinds, in the order split clips are produced.
    pub const ALL: [TrackKind; 2] = [TrackKind::Video, TrackKind::Audio];

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio)
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

impl std::str::FromStr for TrackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            _ => Err(format!("Invalid track kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_kind_serialization() {
        let json = serde_json::to_string(&TrackKind::Video).unwrap();
        assert_eq!(json, r#""video""#);

        let kind: TrackKind = serde_json::from_str(r#""audio""#).unwrap();
        assert_eq!(kind, TrackKind::Audio);
    }

    #[test]
    fn test_track_kind_from_str() {
        assert_eq!("video".parse::<TrackKind>().unwrap(), TrackKind::Video);
        assert_eq!("audio".parse::<TrackKind>().unwrap(), TrackKind::Audio);
        assert!("subtitle".parse::<TrackKind>().is_err());
    }

    #[test]
    fn test_track_kind_order() {
        assert_eq!(TrackKind::ALL, [TrackKind::Video, TrackKind::Audio]);
        assert!(TrackKind::Video.is_video());
        assert!(TrackKind::Audio.is_audio());
    }
}
