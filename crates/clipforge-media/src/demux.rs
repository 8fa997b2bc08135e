//! Demuxer: per-track sample indexes in microseconds and random access to
//! encoded chunks.
//!
//! The [`Container`] is built once from the complete source bytes and shared
//! read-only by every consumer (schedulers, split clips, clones). Timestamps
//! are converted from media timescale to microseconds here, and presentation
//! timestamps are shifted so the earliest frame of each track starts at zero.

use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use clipforge_common::{time, TrackKind};

use crate::codec::{codec_string, decoder_description};
use crate::mp4::{Mp4File, TrackInfo};
use crate::{Error, Result};

/// Static decoder configuration for one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackConfig {
    /// Media kind.
    pub kind: TrackKind,
    /// Container track ID.
    pub track_id: u32,
    /// RFC 6381 codec string.
    pub codec: String,
    /// Binary codec description (avcC/hvcC record or AudioSpecificConfig).
    pub description: Option<Bytes>,
    /// Media timescale of the source track.
    pub timescale: u32,
    /// Coded width (video).
    pub width: u32,
    /// Coded height (video).
    pub height: u32,
    /// Sample rate (audio).
    pub sample_rate: u32,
    /// Channel count (audio).
    pub channels: u16,
}

/// One sample in decode order, timestamps in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Byte offset in the source.
    pub offset: u64,
    /// Size in bytes.
    pub size: u32,
    /// Presentation timestamp (µs), normalized to start at zero.
    pub pts: u64,
    /// Presentation duration (µs).
    pub duration: u64,
    /// Sync sample.
    pub is_keyframe: bool,
}

impl Sample {
    /// End of this sample's presentation window.
    pub fn end(&self) -> u64 {
        self.pts + self.duration
    }
}

/// An encoded access unit ready to be submitted to a decoder.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    /// Media kind of the owning track.
    pub kind: TrackKind,
    /// Decode-order index within the track.
    pub index: usize,
    /// Presentation timestamp (µs, original timeline).
    pub timestamp: u64,
    /// Presentation duration (µs).
    pub duration: u64,
    /// Whether the chunk is decodable on its own.
    pub is_keyframe: bool,
    /// Encoded payload (zero-copy slice of the source).
    pub data: Bytes,
}

/// Sample index of one track.
#[derive(Debug, Clone)]
pub struct TrackIndex {
    config: TrackConfig,
    /// Samples in decode order.
    samples: Vec<Sample>,
    /// Decode-order indices sorted by presentation timestamp.
    by_pts: Vec<u32>,
    /// Highest decode index among samples whose presentation order is <= i.
    max_decode_prefix: Vec<u32>,
    duration: u64,
}

impl TrackIndex {
    /// Build an index from a parsed track.
    pub fn from_track(kind: TrackKind, track: &TrackInfo) -> Result<Self> {
        let table = &track.sample_table;
        if table.is_empty() {
            return Err(Error::unsupported(format!(
                "{} track {} has no samples",
                kind, track.track_id
            )));
        }

        let timescale = track.timescale;
        let first_pts = table.iter().map(|s| s.pts()).min().unwrap_or(0);

        let samples: Vec<Sample> = table
            .iter()
            .map(|s| Sample {
                offset: s.offset,
                size: s.size,
                pts: time::ticks_to_micros(s.pts() - first_pts, timescale),
                duration: time::ticks_to_micros(s.duration as u64, timescale),
                is_keyframe: s.is_keyframe,
            })
            .collect();

        let mut by_pts: Vec<u32> = (0..samples.len() as u32).collect();
        by_pts.sort_by_key(|&i| (samples[i as usize].pts, i));

        let max_decode_prefix = by_pts
            .iter()
            .scan(0u32, |max, &i| {
                *max = (*max).max(i);
                Some(*max)
            })
            .collect();

        let duration = samples.iter().map(Sample::end).max().unwrap_or(0);

        let config = TrackConfig {
            kind,
            track_id: track.track_id,
            codec: codec_string(track),
            description: decoder_description(track).map(Bytes::from),
            timescale,
            width: track.width.unwrap_or(0),
            height: track.height.unwrap_or(0),
            sample_rate: track.sample_rate.unwrap_or(0),
            channels: track.channels.unwrap_or(0),
        };

        tracing::debug!(
            kind = %kind,
            track_id = config.track_id,
            codec = %config.codec,
            samples = samples.len(),
            duration_us = duration,
            "Indexed track"
        );

        Ok(Self {
            config,
            samples,
            by_pts,
            max_decode_prefix,
            duration,
        })
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    pub fn kind(&self) -> TrackKind {
        self.config.kind
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    /// End of the last presentation window (µs).
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Decode-order index of the sample presented at `t`: the last sample (in
    /// presentation order) whose timestamp is at or before `t`.
    ///
    /// Times before the first frame resolve to the first frame.
    pub fn sample_at(&self, t: u64) -> usize {
        let pos = self
            .by_pts
            .partition_point(|&i| self.samples[i as usize].pts <= t);
        self.by_pts[pos.saturating_sub(1)] as usize
    }

    /// Decode-order index of the nearest key frame at or before the sample
    /// presented at `t`.
    pub fn keyframe_at_or_before(&self, t: u64) -> usize {
        let target = self.sample_at(t);
        self.samples[..=target]
            .iter()
            .rposition(|s| s.is_keyframe)
            .unwrap_or(0)
    }

    /// Presentation timestamp of the key frame a seek to `t` starts from.
    pub fn seek_point(&self, t: u64) -> u64 {
        self.samples[self.keyframe_at_or_before(t)].pts
    }

    /// Decode-order range of chunks needed to present `[t0, t1)`, starting at
    /// the nearest preceding key frame.
    pub fn chunks_for_range(&self, t0: u64, t1: u64) -> Range<usize> {
        let start = self.keyframe_at_or_before(t0);
        let shown = self
            .by_pts
            .partition_point(|&i| self.samples[i as usize].pts < t1);
        let end = match shown {
            0 => start,
            n => self.max_decode_prefix[n - 1] as usize + 1,
        };
        start..end.max(start)
    }

    /// Slice the encoded payload of sample `index` out of the source bytes.
    pub fn chunk(&self, index: usize, source: &Bytes) -> Result<EncodedChunk> {
        let sample = self.samples.get(index).ok_or(Error::InvalidSampleIndex {
            index,
            count: self.samples.len(),
        })?;

        let start = sample.offset as usize;
        let end = start + sample.size as usize;
        if end > source.len() {
            return Err(Error::BufferUnderflow {
                need: end,
                have: source.len(),
            });
        }

        Ok(EncodedChunk {
            kind: self.config.kind,
            index,
            timestamp: sample.pts,
            duration: sample.duration,
            is_keyframe: sample.is_keyframe,
            data: source.slice(start..end),
        })
    }
}

/// Parsed container: metadata plus one index per media kind.
#[derive(Debug, Clone)]
pub struct Container {
    /// Original presentation duration (µs).
    pub duration: u64,
    /// First video track with samples.
    pub video: Option<Arc<TrackIndex>>,
    /// First audio track with samples.
    pub audio: Option<Arc<TrackIndex>>,
}

impl Container {
    /// Index for one media kind.
    pub fn track(&self, kind: TrackKind) -> Option<&Arc<TrackIndex>> {
        match kind {
            TrackKind::Video => self.video.as_ref(),
            TrackKind::Audio => self.audio.as_ref(),
        }
    }

    /// Kinds present in the container, video first.
    pub fn kinds(&self) -> Vec<TrackKind> {
        TrackKind::ALL
            .into_iter()
            .filter(|k| self.track(*k).is_some())
            .collect()
    }
}

/// Entry point for turning source bytes into a [`Container`].
pub struct Demuxer;

impl Demuxer {
    /// Parse the container index out of the complete source bytes.
    ///
    /// Fails when the box structure is malformed or no track has samples.
    pub fn parse(source: &Bytes) -> Result<Container> {
        let mp4 = Mp4File::parse_bytes(source)?;

        let video = Self::index(TrackKind::Video, mp4.video_track.as_ref())?;
        let audio = Self::index(TrackKind::Audio, mp4.audio_track.as_ref())?;

        if video.is_none() && audio.is_none() {
            return Err(Error::unsupported("no decodable audio or video track"));
        }

        let movie_duration = time::ticks_to_micros(mp4.duration, mp4.timescale);
        let track_duration = video
            .iter()
            .chain(audio.iter())
            .map(|t| t.duration())
            .max()
            .unwrap_or(0);
        // Some muxers leave mvhd duration at zero
        let duration = if movie_duration > 0 {
            movie_duration
        } else {
            track_duration
        };

        tracing::debug!(
            duration_us = duration,
            has_video = video.is_some(),
            has_audio = audio.is_some(),
            bytes = source.len(),
            "Parsed container"
        );

        Ok(Container {
            duration,
            video,
            audio,
        })
    }

    fn index(kind: TrackKind, track: Option<&TrackInfo>) -> Result<Option<Arc<TrackIndex>>> {
        match track {
            Some(track) if !track.sample_table.is_empty() => {
                Ok(Some(Arc::new(TrackIndex::from_track(kind, track)?)))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mp4::{HandlerType, SampleTableBuilder};

    /// 10 frames at 1000 ticks/s, 100 ticks each, keyframes at 0 and 5.
    fn video_track(ctts: Option<Vec<(u32, i32)>>) -> TrackInfo {
        let mut builder = SampleTableBuilder::new();
        builder.set_stts(vec![(10, 100)]);
        builder.set_sync_samples(vec![1, 6]);
        builder.set_stsc(vec![(1, 10, 1)]);
        builder.set_stsz(10, 10, vec![]);
        builder.set_chunk_offsets(vec![0]);
        if let Some(ctts) = ctts {
            builder.set_ctts(ctts);
        }

        let mut track = TrackInfo::new(1);
        track.handler_type = HandlerType::Video;
        track.timescale = 1000;
        track.duration = 1000;
        track.sample_table = builder.build();
        track.sample_entry = Some(*b"avc1");
        track.codec_data = Some(vec![1, 0x42, 0xc0, 0x1e]);
        track.width = Some(320);
        track.height = Some(240);
        track
    }

    #[test]
    fn test_index_converts_to_micros() {
        let index = TrackIndex::from_track(TrackKind::Video, &video_track(None)).unwrap();
        assert_eq!(index.len(), 10);
        assert_eq!(index.get(1).unwrap().pts, 100_000);
        assert_eq!(index.get(1).unwrap().duration, 100_000);
        assert_eq!(index.duration(), 1_000_000);
        assert_eq!(index.config().codec, "avc1.42c01e");
        assert_eq!(index.config().width, 320);
    }

    #[test]
    fn test_sample_at_and_keyframes() {
        let index = TrackIndex::from_track(TrackKind::Video, &video_track(None)).unwrap();
        assert_eq!(index.sample_at(0), 0);
        assert_eq!(index.sample_at(150_000), 1);
        assert_eq!(index.sample_at(5_000_000), 9);

        assert_eq!(index.keyframe_at_or_before(420_000), 0);
        assert_eq!(index.keyframe_at_or_before(500_000), 5);
        assert_eq!(index.keyframe_at_or_before(999_000), 5);
        assert_eq!(index.seek_point(720_000), 500_000);
    }

    #[test]
    fn test_chunks_for_range() {
        let index = TrackIndex::from_track(TrackKind::Video, &video_track(None)).unwrap();
        assert_eq!(index.chunks_for_range(0, 200_000), 0..2);
        assert_eq!(index.chunks_for_range(600_000, 800_000), 5..8);
        assert_eq!(index.chunks_for_range(300_000, 300_000), 0..3);
    }

    #[test]
    fn test_reordered_frames_normalize_and_extend_range() {
        // decode order I P B B ... with composition offsets reordering pairs
        let ctts = vec![(1, 100), (1, 300), (1, 0), (1, 0), (6, 100)];
        let index = TrackIndex::from_track(TrackKind::Video, &video_track(Some(ctts))).unwrap();

        // Earliest pts (sample 0: 0 + 100 ticks) becomes zero
        assert_eq!(index.get(0).unwrap().pts, 0);
        // Sample 1 (dts 100 + 300) is presented after samples 2 and 3
        assert_eq!(index.get(1).unwrap().pts, 300_000);
        assert_eq!(index.sample_at(100_000), 2);

        // Presenting [0, 150ms) needs sample 2, which comes after sample 1
        assert_eq!(index.chunks_for_range(0, 150_000), 0..3);
    }

    #[test]
    fn test_chunk_slices_source() {
        let index = TrackIndex::from_track(TrackKind::Video, &video_track(None)).unwrap();
        let source = Bytes::from((0u8..100).collect::<Vec<_>>());

        let chunk = index.chunk(3, &source).unwrap();
        assert_eq!(chunk.index, 3);
        assert_eq!(chunk.timestamp, 300_000);
        assert_eq!(&chunk.data[..], &(30u8..40).collect::<Vec<_>>()[..]);

        assert!(matches!(
            index.chunk(10, &source),
            Err(Error::InvalidSampleIndex { index: 10, .. })
        ));
        assert!(matches!(
            index.chunk(3, &Bytes::from_static(&[0; 8])),
            Err(Error::BufferUnderflow { .. })
        ));
    }

    #[test]
    fn test_empty_track_is_unsupported() {
        let track = TrackInfo::new(1);
        assert!(matches!(
            TrackIndex::from_track(TrackKind::Audio, &track),
            Err(Error::Unsupported(_))
        ));
    }
}
