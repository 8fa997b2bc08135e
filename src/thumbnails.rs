//! Thumbnail sampling.
//!
//! Thumbnails are taken at a fixed cadence over the edited timeline with a
//! private video scheduler, so sampling never disturbs a clip's tick cursor.

use std::sync::Arc;

use bytes::Bytes;
use clipforge_media::TrackIndex;
use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::config::EngineConfig;
use crate::decode::{DecoderFactory, Frame, TrackScheduler};
use crate::edit::EditOverlay;
use crate::error::{ClipError, Result};

/// A scaled preview image.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// Edited-timeline position the thumbnail was sampled at (µs).
    pub timestamp: u64,
    pub image: RgbaImage,
}

/// Edited timestamps to sample: `i * interval` for `i` in
/// `0..ceil(duration / interval)`.
pub fn sample_times(duration: u64, interval: u64) -> Vec<u64> {
    if interval == 0 {
        return Vec::new();
    }
    (0..duration.div_ceil(interval)).map(|i| i * interval).collect()
}

/// Decode one thumbnail per sample time from `index`.
pub(crate) async fn sample(
    index: Arc<TrackIndex>,
    source: Bytes,
    overlay: &EditOverlay,
    factory: &dyn DecoderFactory,
    config: &EngineConfig,
) -> Result<Vec<Thumbnail>> {
    let times = sample_times(overlay.duration(), config.thumbnail.interval_us);
    let mut scheduler = TrackScheduler::spawn(
        index,
        source,
        factory,
        config.decode.lookahead_frames,
        config.decode.seek_forward_threshold_us,
    )?;

    let mut thumbnails = Vec::with_capacity(times.len());
    for timestamp in times {
        let Some(original) = overlay.map(timestamp) else {
            break;
        };

        // A gap in the track yields the next frame instead
        let frame = match scheduler.frame_at(original, overlay).await? {
            Some(frame) => frame,
            None => match scheduler.next_frame().await? {
                Some(frame) => frame,
                None => break,
            },
        };

        thumbnails.push(Thumbnail {
            timestamp,
            image: rasterize(&frame, config.thumbnail.width)?,
        });
    }

    tracing::debug!(
        count = thumbnails.len(),
        interval_us = config.thumbnail.interval_us,
        "Sampled thumbnails"
    );
    Ok(thumbnails)
}

/// Convert a decoded video frame into an image `width` pixels wide.
fn rasterize(frame: &Frame, width: u32) -> Result<RgbaImage> {
    let video = frame
        .as_video()
        .ok_or_else(|| ClipError::decode("thumbnail source is not a video frame"))?;

    let image = RgbaImage::from_raw(video.width, video.height, video.data.to_vec())
        .ok_or_else(|| {
            ClipError::decode(format!(
                "frame buffer of {} bytes does not hold {}x{} RGBA",
                video.data.len(),
                video.width,
                video.height
            ))
        })?;

    let height = scaled_height(video.width, video.height, width);
    Ok(imageops::resize(&image, width, height, FilterType::Lanczos3))
}

fn scaled_height(src_width: u32, src_height: u32, width: u32) -> u32 {
    if src_width == 0 {
        return 1;
    }
    let height = (src_height as u64 * width as u64 + src_width as u64 / 2) / src_width as u64;
    height.max(1) as u32
}
