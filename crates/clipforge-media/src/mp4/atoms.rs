//! Box types and per-track records produced by the reader.

use clipforge_common::{time, TrackKind};

use super::SampleTable;

/// Four-character box code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomType(pub [u8; 4]);

impl AtomType {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MDAT: Self = Self(*b"mdat");
    pub const MVHD: Self = Self(*b"mvhd");
    pub const TRAK: Self = Self(*b"trak");
    pub const TKHD: Self = Self(*b"tkhd");
    pub const MDIA: Self = Self(*b"mdia");
    pub const MDHD: Self = Self(*b"mdhd");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const MINF: Self = Self(*b"minf");
    pub const STBL: Self = Self(*b"stbl");
    pub const STSD: Self = Self(*b"stsd");
    pub const STTS: Self = Self(*b"stts");
    pub const STSS: Self = Self(*b"stss");
    pub const STSC: Self = Self(*b"stsc");
    pub const STSZ: Self = Self(*b"stsz");
    pub const STCO: Self = Self(*b"stco");
    pub const CO64: Self = Self(*b"co64");
    pub const CTTS: Self = Self(*b"ctts");

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// The code as text, or `????` when it is not UTF-8.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of one box inside the source.
#[derive(Debug, Clone)]
pub struct Atom {
    pub atom_type: AtomType,
    /// Total size including the header.
    pub size: u64,
    /// Offset of the first payload byte.
    pub data_offset: u64,
    /// 8, or 16 for 64-bit sizes.
    pub header_size: u8,
}

impl Atom {
    pub fn data_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size as u64)
    }

    /// Offset one past the last byte of this atom.
    pub fn end(&self) -> u64 {
        self.data_offset + self.data_size()
    }
}

/// `hdlr` handler of a track. Only video and sound handlers are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerType {
    Video,
    Audio,
    Other([u8; 4]),
}

impl HandlerType {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        match &bytes {
            b"vide" => Self::Video,
            b"soun" => Self::Audio,
            _ => Self::Other(bytes),
        }
    }

    /// The media kind this handler carries, if clips can expose it.
    pub fn track_kind(&self) -> Option<TrackKind> {
        match self {
            Self::Video => Some(TrackKind::Video),
            Self::Audio => Some(TrackKind::Audio),
            Self::Other(_) => None,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio)
    }
}

/// Everything the reader extracts from one `trak`.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub track_id: u32,
    pub handler_type: HandlerType,
    /// Track duration in media timescale ticks.
    pub duration: u64,
    /// Ticks per second.
    pub timescale: u32,
    pub sample_table: SampleTable,
    /// Fourcc of the first stsd entry (avc1, hvc1, mp4a, ...).
    pub sample_entry: Option<[u8; 4]>,
    /// Payload of the codec configuration box (avcC, hvcC or esds).
    pub codec_data: Option<Vec<u8>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

impl TrackInfo {
    pub fn new(track_id: u32) -> Self {
        Self {
            track_id,
            handler_type: HandlerType::Other([0; 4]),
            duration: 0,
            timescale: 1,
            sample_table: SampleTable::default(),
            sample_entry: None,
            codec_data: None,
            width: None,
            height: None,
            sample_rate: None,
            channels: None,
        }
    }

    /// Track duration in microseconds.
    pub fn duration_us(&self) -> u64 {
        time::ticks_to_micros(self.duration, self.timescale)
    }

    pub fn sample_entry_str(&self) -> Option<&str> {
        self.sample_entry
            .as_ref()
            .and_then(|fourcc| std::str::from_utf8(fourcc).ok())
    }
}
