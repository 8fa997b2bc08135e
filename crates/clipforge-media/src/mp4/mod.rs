//! MP4 container parsing.
//!
//! This module walks the box tree of a progressive MP4 file and resolves the
//! sample tables of its first video and first audio track. Sample payloads are
//! never read here; [`crate::demux`] slices them out of the source bytes on
//! demand.

mod atoms;
mod reader;
mod sample_table;

pub use atoms::{Atom, AtomType, HandlerType, TrackInfo};
pub use reader::Mp4Reader;
pub use sample_table::{SampleEntry, SampleTable, SampleTableBuilder};

use crate::Result;
use std::io::{Cursor, Read, Seek};

/// Parsed MP4 file with extracted sample tables.
#[derive(Debug)]
pub struct Mp4File {
    /// Duration in movie timescale units.
    pub duration: u64,
    /// Movie timescale (time units per second).
    pub timescale: u32,
    /// Video track information.
    pub video_track: Option<TrackInfo>,
    /// Audio track information.
    pub audio_track: Option<TrackInfo>,
}

impl Mp4File {
    /// Parse an MP4 file from a reader.
    pub fn parse<R: Read + Seek>(reader: R) -> Result<Self> {
        Mp4Reader::new(reader)?.parse()
    }

    /// Parse an MP4 file held in memory.
    pub fn parse_bytes(data: &[u8]) -> Result<Self> {
        Self::parse(Cursor::new(data))
    }
}
