//! Clip lifecycle: construction, ticking, edits, split, clone and teardown.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use clipforge_common::{ClipId, TrackKind};
use clipforge_media::{Container, Demuxer};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

use crate::config::{validate_config, ClipOptions};
use crate::decode::{DecoderFactory, Frame, TrackScheduler};
use crate::edit::EditOverlay;
use crate::error::{ClipError, Result};
use crate::thumbnails::{self, Thumbnail};
use crate::tick::{self, TickInterceptor, TickResult, TickState};

/// Presentation metadata of a clip.
///
/// `duration` always reflects the edited timeline. Fields of a media kind the
/// clip does not expose are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClipMeta {
    pub duration: u64,
    pub width: u32,
    pub height: u32,
    pub audio_sample_rate: u32,
    pub audio_chan_count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipState {
    /// Parsed and idle; no decoder has been started.
    Ready,
    /// Decoders are running and positioned.
    Ticking,
    /// An edit invalidated the decode position; the next tick seeks.
    SeekPending,
    /// Torn down; every operation fails with [`ClipError::Disposed`].
    Disposed,
}

/// Decode state created on the first tick.
struct Playback {
    video: Option<TrackScheduler>,
    audio: Option<TrackScheduler>,
    /// Last resolved tick, replayed for repeated identical timestamps.
    last: Option<(u64, TickResult)>,
}

impl Playback {
    fn schedulers_mut(&mut self) -> impl Iterator<Item = &mut TrackScheduler> {
        self.video.iter_mut().chain(self.audio.iter_mut())
    }

    fn exhausted(&self) -> bool {
        self.video
            .iter()
            .chain(self.audio.iter())
            .all(TrackScheduler::is_exhausted)
    }
}

/// An editable, seekable view over an MP4 source.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use clipforge::{Clip, ClipOptions, DecoderFactory};
/// # async fn run(factory: Arc<dyn DecoderFactory>) -> clipforge::Result<()> {
/// let mut clip = Clip::open("input.mp4", ClipOptions::default(), factory).await?;
/// clip.delete_range(0, 2_000_000)?;
///
/// let mut t = 0;
/// loop {
///     let result = clip.tick(t).await?;
///     if result.is_done() {
///         break;
///     }
///     t += 33_000;
/// }
/// clip.destroy();
/// # Ok(())
/// # }
/// ```
pub struct Clip {
    id: ClipId,
    source: Bytes,
    container: Arc<Container>,
    overlay: EditOverlay,
    options: ClipOptions,
    factory: Arc<dyn DecoderFactory>,
    interceptor: Arc<dyn TickInterceptor>,
    /// Kinds this clip decodes, video first.
    tracks: Vec<TrackKind>,
    meta: ClipMeta,
    playback: Option<Playback>,
    state: ClipState,
}

impl Clip {
    /// Read `reader` to the end and parse it.
    pub async fn from_reader<R>(
        mut reader: R,
        options: ClipOptions,
        factory: Arc<dyn DecoderFactory>,
    ) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = Vec::new();
        let read = reader.read_to_end(&mut buf).await?;
        debug!(bytes = read, "Read clip source");
        Self::from_bytes(buf, options, factory).await
    }

    /// Open and parse an MP4 file.
    pub async fn open(
        path: impl AsRef<Path>,
        options: ClipOptions,
        factory: Arc<dyn DecoderFactory>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        debug!(path = ?path, "Opening clip");
        Self::from_reader(file, options, factory).await
    }

    /// Parse a clip held in memory.
    pub async fn from_bytes(
        source: impl Into<Bytes>,
        options: ClipOptions,
        factory: Arc<dyn DecoderFactory>,
    ) -> Result<Self> {
        validate_config(&options.engine)?;
        let source = source.into();
        let container = Arc::new(Demuxer::parse(&source)?);

        let tracks = container
            .kinds()
            .into_iter()
            .filter(|kind| kind.is_video() || options.audio)
            .collect();
        let overlay = EditOverlay::new(container.duration);

        let clip = Self::assemble(
            source,
            container,
            overlay,
            options,
            factory,
            tick::identity(),
            tracks,
        );
        info!(
            clip_id = %clip.id,
            duration_us = clip.meta.duration,
            tracks = ?clip.tracks,
            "Clip ready"
        );
        Ok(clip)
    }

    fn assemble(
        source: Bytes,
        container: Arc<Container>,
        overlay: EditOverlay,
        options: ClipOptions,
        factory: Arc<dyn DecoderFactory>,
        interceptor: Arc<dyn TickInterceptor>,
        tracks: Vec<TrackKind>,
    ) -> Self {
        let mut clip = Self {
            id: ClipId::new(),
            source,
            container,
            overlay,
            options,
            factory,
            interceptor,
            tracks,
            meta: ClipMeta {
                duration: 0,
                width: 0,
                height: 0,
                audio_sample_rate: 0,
                audio_chan_count: 0,
            },
            playback: None,
            state: ClipState::Ready,
        };
        clip.meta = clip.build_meta();
        clip
    }

    fn build_meta(&self) -> ClipMeta {
        let mut meta = ClipMeta {
            duration: self.overlay.duration(),
            width: 0,
            height: 0,
            audio_sample_rate: 0,
            audio_chan_count: 0,
        };
        for kind in &self.tracks {
            let Some(index) = self.container.track(*kind) else {
                continue;
            };
            let config = index.config();
            match kind {
                TrackKind::Video => {
                    meta.width = config.width;
                    meta.height = config.height;
                }
                TrackKind::Audio => {
                    meta.audio_sample_rate = config.sample_rate;
                    meta.audio_chan_count = config.channels;
                }
            }
        }
        meta
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn meta(&self) -> &ClipMeta {
        &self.meta
    }

    pub fn state(&self) -> ClipState {
        self.state
    }

    pub fn options(&self) -> &ClipOptions {
        &self.options
    }

    /// Current edit overlay.
    pub fn overlay(&self) -> &EditOverlay {
        &self.overlay
    }

    /// Media kinds this clip decodes.
    pub fn tracks(&self) -> &[TrackKind] {
        &self.tracks
    }

    pub fn tick_interceptor(&self) -> Arc<dyn TickInterceptor> {
        Arc::clone(&self.interceptor)
    }

    pub fn set_tick_interceptor(&mut self, interceptor: Arc<dyn TickInterceptor>) {
        self.interceptor = interceptor;
    }

    fn ensure_live(&self) -> Result<()> {
        match self.state {
            ClipState::Disposed => Err(ClipError::Disposed),
            _ => Ok(()),
        }
    }

    /// Resolve the edited timestamp `timestamp` (µs) to the frames due there.
    ///
    /// Repeating the previous timestamp returns the same frames again without
    /// decoding.
    pub async fn tick(&mut self, timestamp: u64) -> Result<TickResult> {
        self.ensure_live()?;
        let result = self.resolve(timestamp).await?;
        Ok(self.interceptor.intercept(timestamp, result).await)
    }

    async fn resolve(&mut self, timestamp: u64) -> Result<TickResult> {
        if let Some((last, result)) = self.playback.as_ref().and_then(|p| p.last.as_ref()) {
            if *last == timestamp {
                return Ok(result.clone());
            }
        }

        if timestamp >= self.overlay.duration() {
            return Ok(TickResult::done());
        }

        let playback = match &mut self.playback {
            Some(playback) => playback,
            empty => empty.insert(Self::start_playback(
                &self.container,
                &self.source,
                &self.tracks,
                &self.options,
                self.factory.as_ref(),
            )?),
        };
        playback.last = None;
        self.state = ClipState::Ticking;

        let overlay = &self.overlay;
        let Some(original) = overlay.map(timestamp) else {
            return Ok(TickResult::done());
        };

        let video = match &mut playback.video {
            Some(scheduler) => scheduler
                .frame_at(original, overlay)
                .await?
                .map(|frame| to_edited(frame, overlay)),
            None => None,
        };

        let audio = match &mut playback.audio {
            Some(scheduler) => scheduler
                .frames_until(original, overlay)
                .await?
                .into_iter()
                .map(|frame| to_edited(frame, overlay).with_gain(self.options.volume))
                .collect(),
            None => Vec::new(),
        };

        let state = if video.is_none() && audio.is_empty() && playback.exhausted() {
            TickState::Done
        } else {
            TickState::Success
        };

        let result = TickResult {
            state,
            video,
            audio,
        };
        playback.last = Some((timestamp, result.clone()));
        Ok(result)
    }

    fn start_playback(
        container: &Container,
        source: &Bytes,
        tracks: &[TrackKind],
        options: &ClipOptions,
        factory: &dyn DecoderFactory,
    ) -> Result<Playback> {
        let decode = &options.engine.decode;
        let spawn = |kind: TrackKind, lookahead: usize| -> Result<Option<TrackScheduler>> {
            match container.track(kind) {
                Some(index) if tracks.contains(&kind) => Ok(Some(TrackScheduler::spawn(
                    Arc::clone(index),
                    source.clone(),
                    factory,
                    lookahead,
                    decode.seek_forward_threshold_us,
                )?)),
                _ => Ok(None),
            }
        };

        Ok(Playback {
            video: spawn(TrackKind::Video, decode.lookahead_frames)?,
            audio: spawn(TrackKind::Audio, decode.audio_lookahead_frames)?,
            last: None,
        })
    }

    /// Delete the edited range `[start_us, end_us)`.
    ///
    /// `end_us` is clamped to the current duration; an empty range is a no-op.
    pub fn delete_range(&mut self, start_us: u64, end_us: u64) -> Result<()> {
        self.ensure_live()?;
        let before = self.overlay.duration();
        let duration = self.overlay.delete_range(start_us, end_us)?;
        if duration == before {
            return Ok(());
        }

        self.meta.duration = duration;
        if let Some(playback) = &mut self.playback {
            playback.last = None;
            playback
                .schedulers_mut()
                .for_each(TrackScheduler::invalidate);
            self.state = ClipState::SeekPending;
        }

        debug!(
            clip_id = %self.id,
            start_us,
            end_us,
            duration_us = duration,
            "Clip range deleted"
        );
        Ok(())
    }

    /// Sample thumbnails across the edited timeline.
    ///
    /// Uses a private decoder; the tick position is unaffected. Clips without
    /// video return an empty list.
    pub async fn thumbnails(&self) -> Result<Vec<Thumbnail>> {
        self.ensure_live()?;
        let Some(index) = self
            .container
            .video
            .as_ref()
            .filter(|_| self.tracks.contains(&TrackKind::Video))
        else {
            return Ok(Vec::new());
        };

        thumbnails::sample(
            Arc::clone(index),
            self.source.clone(),
            &self.overlay,
            self.factory.as_ref(),
            &self.options.engine,
        )
        .await
    }

    /// One clip per decoded media kind, video first.
    ///
    /// Children share the parsed index and source bytes and start from a copy
    /// of the current edits and interceptor.
    pub async fn split_track(&self) -> Result<Vec<Clip>> {
        self.ensure_live()?;

        let children: Vec<Clip> = self
            .tracks
            .iter()
            .map(|&kind| self.derive(Arc::clone(&self.container), vec![kind]))
            .collect();

        debug!(clip_id = %self.id, children = children.len(), "Split clip");
        Ok(children)
    }

    /// An independent copy with the same edits, options and interceptor.
    ///
    /// The source is parsed again, so the copy shares nothing mutable with
    /// this clip.
    pub async fn try_clone(&self) -> Result<Clip> {
        self.ensure_live()?;
        let container = Arc::new(Demuxer::parse(&self.source)?);
        let clone = self.derive(container, self.tracks.clone());
        debug!(clip_id = %self.id, clone_id = %clone.id, "Cloned clip");
        Ok(clone)
    }

    fn derive(&self, container: Arc<Container>, tracks: Vec<TrackKind>) -> Clip {
        Self::assemble(
            self.source.clone(),
            container,
            self.overlay.clone(),
            self.options.clone(),
            Arc::clone(&self.factory),
            Arc::clone(&self.interceptor),
            tracks,
        )
    }

    /// Stop all decoding and release buffered frames. Idempotent.
    pub fn destroy(&mut self) {
        if self.state == ClipState::Disposed {
            return;
        }
        // Dropping the schedulers aborts their workers and decoders
        self.playback = None;
        self.source = Bytes::new();
        self.state = ClipState::Disposed;
        debug!(clip_id = %self.id, "Clip destroyed");
    }
}

impl Drop for Clip {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Clip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clip")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("meta", &self.meta)
            .field("tracks", &self.tracks)
            .finish_non_exhaustive()
    }
}

/// Rewrite a frame's timestamp onto the edited timeline. Frames that start
/// inside a deleted range are placed at the next kept point.
fn to_edited(mut frame: Frame, overlay: &EditOverlay) -> Frame {
    frame.timestamp = overlay
        .unmap(frame.timestamp)
        .unwrap_or_else(|| overlay.project(frame.timestamp));
    frame
}
