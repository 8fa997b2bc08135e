//! Decoded frame handles.
//!
//! A [`Frame`] owns a reference to its payload; dropping (or [`Frame::close`])
//! the last handle releases the underlying buffer. Handles are cheap to clone
//! and clones share the payload.

use std::sync::Arc;

use bytes::Bytes;
use clipforge_common::TrackKind;

/// RGBA8 pixels, row-major, `width * height * 4` bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, data: Bytes) -> Self {
        Self {
            width,
            height,
            data,
        }
    }
}

/// Interleaved f32 PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Arc<[f32]>,
}

impl AudioFrame {
    pub fn new(sample_rate: u32, channels: u16, samples: impl Into<Arc<[f32]>>) -> Self {
        Self {
            sample_rate,
            channels,
            samples: samples.into(),
        }
    }

    /// PCM frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        match self.channels {
            0 => 0,
            n => self.samples.len() / n as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Video(VideoFrame),
    Audio(AudioFrame),
}

/// A decoded frame with its presentation window in microseconds.
///
/// Frames coming out of a decoder carry original-timeline timestamps; frames
/// returned by [`Clip::tick`](crate::Clip::tick) carry edited-timeline ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp: u64,
    pub duration: u64,
    pub payload: FramePayload,
}

impl Frame {
    pub fn video(timestamp: u64, duration: u64, frame: VideoFrame) -> Self {
        Self {
            timestamp,
            duration,
            payload: FramePayload::Video(frame),
        }
    }

    pub fn audio(timestamp: u64, duration: u64, frame: AudioFrame) -> Self {
        Self {
            timestamp,
            duration,
            payload: FramePayload::Audio(frame),
        }
    }

    pub fn kind(&self) -> TrackKind {
        match self.payload {
            FramePayload::Video(_) => TrackKind::Video,
            FramePayload::Audio(_) => TrackKind::Audio,
        }
    }

    /// End of the presentation window.
    pub fn end(&self) -> u64 {
        self.timestamp + self.duration
    }

    pub fn as_video(&self) -> Option<&VideoFrame> {
        match &self.payload {
            FramePayload::Video(v) => Some(v),
            FramePayload::Audio(_) => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioFrame> {
        match &self.payload {
            FramePayload::Audio(a) => Some(a),
            FramePayload::Video(_) => None,
        }
    }

    /// Whether two handles share the same payload buffer.
    pub fn shares_payload(&self, other: &Frame) -> bool {
        match (&self.payload, &other.payload) {
            (FramePayload::Video(a), FramePayload::Video(b)) => {
                a.data.as_ptr() == b.data.as_ptr() && a.data.len() == b.data.len()
            }
            (FramePayload::Audio(a), FramePayload::Audio(b)) => Arc::ptr_eq(&a.samples, &b.samples),
            _ => false,
        }
    }

    /// Apply a linear gain to audio samples. Video frames and unit gain are
    /// returned untouched.
    pub(crate) fn with_gain(mut self, gain: f32) -> Self {
        if let FramePayload::Audio(audio) = &mut self.payload {
            if gain != 1.0 {
                audio.samples = audio.samples.iter().map(|s| s * gain).collect();
            }
        }
        self
    }

    /// Release this handle.
    pub fn close(self) {
        drop(self);
    }
}
