//! Shared test harness for integration tests.
//!
//! Provides fixture MP4 files built with the media crate's writer, a mock
//! decoder factory that turns chunks into tiny RGBA frames and constant PCM,
//! and [`TestHarness`] which ties the two into ready-to-tick clips.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use bytes::Bytes;
use clipforge::{
    AudioFrame, Clip, ClipError, ClipOptions, Decoder, DecoderFactory, EncodedChunk, Frame,
    TrackConfig, TrackKind, VideoFrame,
};
use clipforge_media::writer::{AudioSpec, Mp4Writer, VideoSpec};

pub const WIDTH: u16 = 32;
pub const HEIGHT: u16 = 18;
pub const TICK_US: u64 = 33_000;

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A 24 fps video file of `seconds` length with key frames every 2 s.
pub fn video_only(seconds: u32) -> Bytes {
    Bytes::from(Mp4Writer::new().video(small_video(seconds)).build())
}

/// Video plus 44.1 kHz stereo AAC.
pub fn video_and_audio(seconds: u32) -> Bytes {
    Bytes::from(
        Mp4Writer::new()
            .video(small_video(seconds))
            .audio(AudioSpec::aac(seconds))
            .build(),
    )
}

pub fn audio_only(seconds: u32) -> Bytes {
    Bytes::from(Mp4Writer::new().audio(AudioSpec::aac(seconds)).build())
}

fn small_video(seconds: u32) -> VideoSpec {
    VideoSpec {
        width: WIDTH,
        height: HEIGHT,
        ..VideoSpec::fps24(seconds)
    }
}

/// Counters shared by every decoder a [`MockFactory`] creates.
#[derive(Default)]
pub struct DecodeStats {
    pub created: AtomicUsize,
    pub chunks: AtomicUsize,
    pub live: AtomicUsize,
}

impl DecodeStats {
    pub fn chunks(&self) -> usize {
        self.chunks.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Decoders not yet dropped.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockFactory {
    pub stats: Arc<DecodeStats>,
    /// Fail when the chunk with this decode index is submitted.
    pub fail_at: Option<usize>,
}

impl DecoderFactory for MockFactory {
    fn create(&self, _config: &TrackConfig) -> clipforge::Result<Box<dyn Decoder>> {
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        self.stats.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDecoder {
            config: None,
            held: None,
            fail_at: self.fail_at,
            stats: Arc::clone(&self.stats),
        }))
    }
}

/// Emits one frame per chunk, one chunk late.
struct MockDecoder {
    config: Option<TrackConfig>,
    held: Option<Frame>,
    fail_at: Option<usize>,
    stats: Arc<DecodeStats>,
}

#[async_trait]
impl Decoder for MockDecoder {
    async fn configure(&mut self, config: &TrackConfig) -> clipforge::Result<()> {
        self.config = Some(config.clone());
        Ok(())
    }

    async fn decode(&mut self, chunk: EncodedChunk) -> clipforge::Result<Vec<Frame>> {
        if self.fail_at == Some(chunk.index) {
            return Err(ClipError::decode(format!("corrupt chunk {}", chunk.index)));
        }
        self.stats.chunks.fetch_add(1, Ordering::SeqCst);

        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ClipError::decode("decoder used before configure"))?;
        let frame = match chunk.kind {
            TrackKind::Video => {
                let size = (config.width * config.height * 4) as usize;
                Frame::video(
                    chunk.timestamp,
                    chunk.duration,
                    VideoFrame::new(
                        config.width,
                        config.height,
                        Bytes::from(vec![chunk.index as u8; size]),
                    ),
                )
            }
            TrackKind::Audio => {
                let samples = vec![0.5f32; 1024 * config.channels as usize];
                Frame::audio(
                    chunk.timestamp,
                    chunk.duration,
                    AudioFrame::new(config.sample_rate, config.channels, samples),
                )
            }
        };
        Ok(self.held.replace(frame).into_iter().collect())
    }

    async fn flush(&mut self) -> clipforge::Result<Vec<Frame>> {
        Ok(self.held.take().into_iter().collect())
    }

    fn reset(&mut self) {
        self.held = None;
    }
}

impl Drop for MockDecoder {
    fn drop(&mut self) {
        self.stats.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Clip factory bound to one mock decoder factory.
pub struct TestHarness {
    pub factory: Arc<MockFactory>,
}

impl TestHarness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            factory: Arc::new(MockFactory::default()),
        }
    }

    pub fn failing_at(chunk: usize) -> Self {
        init_tracing();
        Self {
            factory: Arc::new(MockFactory {
                fail_at: Some(chunk),
                ..Default::default()
            }),
        }
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.factory.stats
    }

    pub async fn clip(&self, source: Bytes) -> Clip {
        self.clip_with(source, ClipOptions::default()).await
    }

    pub async fn clip_with(&self, source: Bytes, options: ClipOptions) -> Clip {
        Clip::from_bytes(source, options, self.factory.clone())
            .await
            .expect("fixture should parse")
    }
}

/// Tick from 0 at a fixed step until the clip reports done, returning the
/// timestamps of every delivered video frame.
pub async fn play(clip: &mut Clip, step: u64) -> Vec<u64> {
    let mut delivered = Vec::new();
    let mut t = 0;
    loop {
        let result = clip.tick(t).await.expect("tick should succeed");
        if result.is_done() {
            break;
        }
        if let Some(frame) = result.video {
            delivered.push(frame.timestamp);
        }
        t += step;
    }
    delivered
}
