//! clipforge-media: MP4 demuxing and codec configuration.
//!
//! This crate turns the bytes of a progressive MP4 file into per-track sample
//! indexes that a decode scheduler can seek through, and slices encoded chunks
//! out of the source without copying.
//!
//! # Modules
//!
//! - `mp4` - box tree walking and sample table resolution (stts/stsz/stss/stco/ctts)
//! - `codec` - RFC 6381 codec strings and decoder descriptions (avcC, esds)
//! - `demux` - microsecond sample indexes, key frame lookup, chunk slicing
//! - `writer` - synthetic MP4 writer for fixtures (`test-util` feature)

pub mod codec;
pub mod demux;
pub mod error;
pub mod mp4;
#[cfg(any(test, feature = "test-util"))]
pub mod writer;

pub use demux::{Container, Demuxer, EncodedChunk, Sample, TrackConfig, TrackIndex};
pub use error::{Error, Result};
pub use mp4::Mp4File;
