//! Error types for clip operations.

use thiserror::Error;

/// Errors surfaced by [`Clip`](crate::Clip) and its collaborators.
#[derive(Error, Debug)]
pub enum ClipError {
    /// The byte source is not a readable MP4 container.
    #[error("container parse error: {0}")]
    ContainerParse(#[from] clipforge_media::Error),

    /// The decoder primitive failed; the clip cannot produce further frames.
    #[error("decode error: {0}")]
    Decode(String),

    /// A deletion range does not fit the current timeline.
    #[error("invalid range [{start}, {end}) for duration {duration}")]
    InvalidRange { start: u64, end: u64, duration: u64 },

    /// The clip was destroyed.
    #[error("clip has been disposed")]
    Disposed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClipError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias for clip operations.
pub type Result<T> = std::result::Result<T, ClipError>;
