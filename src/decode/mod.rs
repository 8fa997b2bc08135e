//! Decode scheduling.
//!
//! Decoding is delegated to an embedder-supplied [`Decoder`]. Each track gets
//! its own worker task that owns the decoder, feeds it encoded chunks in decode
//! order and pushes decoded frames into a bounded channel. The
//! [`TrackScheduler`] on the other end of that channel resolves presentation
//! timestamps to frames, seeking the worker when the request jumps.

mod frame;
mod scheduler;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use frame::{AudioFrame, Frame, FramePayload, VideoFrame};
pub use scheduler::TrackScheduler;

use async_trait::async_trait;
use clipforge_media::{EncodedChunk, TrackConfig};

use crate::error::Result;

/// A codec instance for one track.
///
/// Frames must be emitted in presentation order and carry original-timeline
/// timestamps (normally copied from the chunk). A decoder may hold frames
/// back internally; they are drained by [`flush`](Self::flush).
#[async_trait]
pub trait Decoder: Send {
    /// Prepare for the given track. Called once before the first chunk.
    async fn configure(&mut self, config: &TrackConfig) -> Result<()>;

    /// Submit one chunk and collect whatever frames became available.
    async fn decode(&mut self, chunk: EncodedChunk) -> Result<Vec<Frame>>;

    /// Drain all frames still held by the decoder.
    async fn flush(&mut self) -> Result<Vec<Frame>>;

    /// Discard pending work. The next chunk submitted is a key frame.
    fn reset(&mut self);
}

/// Creates decoders for tracks.
pub trait DecoderFactory: Send + Sync {
    fn create(&self, config: &TrackConfig) -> Result<Box<dyn Decoder>>;
}
