//! Mock decoders and fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use clipforge_common::TrackKind;
use clipforge_media::writer::{AudioSpec, Mp4Writer, VideoSpec};
use clipforge_media::{Container, Demuxer, EncodedChunk, TrackConfig};

use super::{AudioFrame, Decoder, DecoderFactory, Frame, VideoFrame};
use crate::error::{ClipError, Result};

pub(crate) const WIDTH: u32 = 16;
pub(crate) const HEIGHT: u32 = 9;

/// A 24 fps video (and optionally 44.1 kHz AAC) file of `seconds` length.
pub(crate) fn fixture(seconds: u32, audio: bool) -> (Bytes, Arc<Container>) {
    let mut video = VideoSpec::fps24(seconds);
    video.width = WIDTH as u16;
    video.height = HEIGHT as u16;

    let mut writer = Mp4Writer::new().video(video);
    if audio {
        writer = writer.audio(AudioSpec::aac(seconds));
    }
    let source = Bytes::from(writer.build());
    let container = Demuxer::parse(&source).unwrap();
    (source, Arc::new(container))
}

/// Decoder that holds one frame back, like most hardware decoders.
#[derive(Default)]
pub(crate) struct MockDecoder {
    config: Option<TrackConfig>,
    held: Option<Frame>,
    fail_at: Option<usize>,
    pub(crate) decoded: Arc<AtomicUsize>,
}

impl MockDecoder {
    /// A decoder that fails on the chunk with decode index `chunk`.
    pub(crate) fn failing_at(chunk: usize) -> Self {
        Self {
            fail_at: Some(chunk),
            ..Default::default()
        }
    }

    /// A decoder that counts decoded chunks into `decoded`.
    pub(crate) fn counting(decoded: Arc<AtomicUsize>) -> Self {
        Self {
            decoded,
            ..Default::default()
        }
    }

    fn frame_for(&self, chunk: &EncodedChunk) -> Frame {
        match chunk.kind {
            TrackKind::Video => {
                let (width, height) = self
                    .config
                    .as_ref()
                    .map_or((WIDTH, HEIGHT), |c| (c.width, c.height));
                let shade = chunk.index as u8;
                let data = vec![shade; (width * height * 4) as usize];
                Frame::video(
                    chunk.timestamp,
                    chunk.duration,
                    VideoFrame::new(width, height, Bytes::from(data)),
                )
            }
            TrackKind::Audio => Frame::audio(
                chunk.timestamp,
                chunk.duration,
                AudioFrame::new(44_100, 2, vec![0.5f32; 2048]),
            ),
        }
    }
}

#[async_trait]
impl Decoder for MockDecoder {
    async fn configure(&mut self, config: &TrackConfig) -> Result<()> {
        self.config = Some(config.clone());
        Ok(())
    }

    async fn decode(&mut self, chunk: EncodedChunk) -> Result<Vec<Frame>> {
        if self.fail_at == Some(chunk.index) {
            return Err(ClipError::decode(format!(
                "mock failure at chunk {}",
                chunk.index
            )));
        }
        self.decoded.fetch_add(1, Ordering::SeqCst);
        let frame = self.frame_for(&chunk);
        Ok(self.held.replace(frame).into_iter().collect())
    }

    async fn flush(&mut self) -> Result<Vec<Frame>> {
        Ok(self.held.take().into_iter().collect())
    }

    fn reset(&mut self) {
        self.held = None;
    }
}

#[derive(Default)]
pub(crate) struct MockFactory {
    pub(crate) decoded: Arc<AtomicUsize>,
    pub(crate) created: AtomicUsize,
}

impl DecoderFactory for MockFactory {
    fn create(&self, _config: &TrackConfig) -> Result<Box<dyn Decoder>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDecoder::counting(Arc::clone(&self.decoded))))
    }
}
