//! Timestamp-driven frame selection over a decode worker.

use std::sync::Arc;

use bytes::Bytes;
use clipforge_common::TrackKind;
use clipforge_media::TrackIndex;
use tracing::{debug, error, trace};

use super::worker::{Worker, WorkerCommand, WorkerEvent};
use super::{DecoderFactory, Frame};
use crate::edit::EditOverlay;
use crate::error::{ClipError, Result};

/// Scheduler for one track.
///
/// Targets are original-timeline microseconds. Buffered frames live in the
/// worker channel plus a one-frame peek slot here; everything tagged with an
/// older seek epoch is discarded on receipt.
pub struct TrackScheduler {
    index: Arc<TrackIndex>,
    worker: Worker,
    epoch: u64,
    peek: Option<Frame>,
    eos: bool,
    failed: Option<String>,
    last_target: Option<u64>,
    force_seek: bool,
    seek_forward_threshold: u64,
}

impl TrackScheduler {
    /// Create a decoder for `index` and start its worker.
    pub fn spawn(
        index: Arc<TrackIndex>,
        source: Bytes,
        factory: &dyn DecoderFactory,
        lookahead: usize,
        seek_forward_threshold: u64,
    ) -> Result<Self> {
        let decoder = factory.create(index.config())?;
        let worker = Worker::spawn(decoder, Arc::clone(&index), source, lookahead);

        Ok(Self {
            index,
            worker,
            epoch: 0,
            peek: None,
            eos: false,
            failed: None,
            last_target: None,
            force_seek: false,
            seek_forward_threshold,
        })
    }

    pub fn kind(&self) -> TrackKind {
        self.index.kind()
    }

    /// Current seek epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// End of stream reached and nothing left to hand out.
    pub fn is_exhausted(&self) -> bool {
        self.eos && self.peek.is_none()
    }

    /// Force a seek on the next request, e.g. after the timeline changed.
    pub fn invalidate(&mut self) {
        self.force_seek = true;
    }

    /// The not yet delivered frame whose presentation window contains
    /// `target`.
    ///
    /// Frames that end at or before `target` are superseded and dropped.
    /// Returns `None` when the next frame is not due yet or the track ended.
    pub async fn frame_at(
        &mut self,
        target: u64,
        overlay: &EditOverlay,
    ) -> Result<Option<Frame>> {
        self.position(target).await?;

        while self.fill_peek().await? {
            let Some(frame) = self.peek.as_ref() else {
                break;
            };
            if frame.timestamp > target {
                return Ok(None);
            }
            if frame.end() <= target || !overlay.is_visible(frame.timestamp, frame.end()) {
                trace!(
                    track = %self.kind(),
                    timestamp = frame.timestamp,
                    target,
                    "Dropping superseded frame"
                );
                self.peek = None;
                continue;
            }
            return Ok(self.peek.take());
        }

        Ok(None)
    }

    /// Every remaining frame that starts at or before `target`, in order,
    /// skipping frames that lie entirely in deleted ranges.
    pub async fn frames_until(
        &mut self,
        target: u64,
        overlay: &EditOverlay,
    ) -> Result<Vec<Frame>> {
        self.position(target).await?;

        let mut frames = Vec::new();
        while self.fill_peek().await? {
            match self.peek.take() {
                Some(frame) if frame.timestamp <= target => {
                    if overlay.is_visible(frame.timestamp, frame.end()) {
                        frames.push(frame);
                    }
                }
                other => {
                    self.peek = other;
                    break;
                }
            }
        }

        Ok(frames)
    }

    /// The next buffered frame regardless of its timestamp.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.fill_peek().await? {
            Ok(self.peek.take())
        } else {
            Ok(None)
        }
    }

    /// Decide whether reaching `target` needs a seek.
    async fn position(&mut self, target: u64) -> Result<()> {
        if let Some(message) = &self.failed {
            return Err(ClipError::decode(message.clone()));
        }

        let last = self.last_target;
        self.last_target = Some(target);

        if std::mem::take(&mut self.force_seek) {
            return self.seek(target, "timeline changed");
        }

        match last {
            // Start at the target's key frame so the first request never
            // returns the backlog from the start of the track
            None if self.index.keyframe_at_or_before(target) > 0 => {
                self.seek(target, "initial")
            }
            Some(last) if target < last => self.seek(target, "backward"),
            last if target > last.unwrap_or(0).saturating_add(self.seek_forward_threshold) => {
                let key_pts = self.index.seek_point(target);
                // Decoding through is cheaper while the key frame is not
                // past what is already buffered.
                if self.fill_peek().await?
                    && self.peek.as_ref().is_some_and(|f| f.timestamp < key_pts)
                {
                    self.seek(target, "forward")
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    fn seek(&mut self, target: u64, reason: &'static str) -> Result<()> {
        let from = self.index.keyframe_at_or_before(target);
        self.epoch += 1;
        self.peek = None;
        self.eos = false;

        debug!(
            track = %self.kind(),
            reason,
            target_us = target,
            from,
            epoch = self.epoch,
            "Seeking"
        );

        self.worker
            .commands
            .send(WorkerCommand::Seek {
                from,
                epoch: self.epoch,
            })
            .map_err(|_| self.fail("decode worker stopped"))
    }

    /// Make sure the peek slot is filled unless the stream ended.
    async fn fill_peek(&mut self) -> Result<bool> {
        if self.peek.is_some() {
            return Ok(true);
        }
        if let Some(message) = &self.failed {
            return Err(ClipError::decode(message.clone()));
        }
        if self.eos {
            return Ok(false);
        }

        loop {
            match self.worker.events.recv().await {
                Some(WorkerEvent::Frame { epoch, frame }) if epoch == self.epoch => {
                    self.peek = Some(frame);
                    return Ok(true);
                }
                Some(WorkerEvent::Eos { epoch }) if epoch == self.epoch => {
                    self.eos = true;
                    return Ok(false);
                }
                Some(WorkerEvent::Failed { epoch, message }) if epoch == self.epoch => {
                    return Err(self.fail(message));
                }
                Some(_) => continue,
                None => return Err(self.fail("decode worker stopped")),
            }
        }
    }

    fn fail(&mut self, message: impl Into<String>) -> ClipError {
        let message = message.into();
        error!(track = %self.kind(), error = %message, "Decode scheduler failed");
        self.failed = Some(message.clone());
        ClipError::Decode(message)
    }
}

impl Drop for TrackScheduler {
    fn drop(&mut self) {
        self.worker.task.abort();
    }
}
