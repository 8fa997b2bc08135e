//! Clipforge - editable, seekable MP4 clips
//!
//! A [`Clip`] wraps an MP4 source and exposes pull-based, frame-accurate
//! sampling over an edited timeline. Range deletion is non-destructive and
//! clips can be split per track or cloned. Decoding is delegated to an
//! embedder-supplied [`DecoderFactory`].

pub mod clip;
pub mod config;
pub mod decode;
pub mod edit;
pub mod error;
pub mod thumbnails;
pub mod tick;

pub use clip::{Clip, ClipMeta, ClipState};
pub use config::{ClipOptions, EngineConfig};
pub use decode::{AudioFrame, Decoder, DecoderFactory, Frame, FramePayload, VideoFrame};
pub use edit::EditOverlay;
pub use error::{ClipError, Result};
pub use thumbnails::Thumbnail;
pub use tick::{TickInterceptor, TickResult, TickState};

pub use clipforge_common::{ClipId, TrackKind};
pub use clipforge_media::{EncodedChunk, TrackConfig};
