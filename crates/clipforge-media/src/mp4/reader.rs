//! MP4 reader with atom parsing.

use super::{Atom, AtomType, HandlerType, Mp4File, SampleTableBuilder, TrackInfo};
use crate::{Error, Result};
use clipforge_common::TrackKind;
use std::io::{Read, Seek, SeekFrom};

/// Maximum allowed atom data size (64 MB) to prevent OOM on malformed files.
const MAX_ATOM_DATA_SIZE: u64 = 64 * 1024 * 1024;

/// Offset of the child boxes inside a VisualSampleEntry, relative to stsd data.
const VISUAL_ENTRY_CHILDREN: usize = 94;

/// Offset of the child boxes inside an AudioSampleEntry, relative to stsd data.
const AUDIO_ENTRY_CHILDREN: usize = 44;

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn be_u64(data: &[u8], at: usize) -> Option<u64> {
    data.get(at..at + 8).map(|b| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        u64::from_be_bytes(buf)
    })
}

fn fourcc(data: &[u8], at: usize) -> Option<[u8; 4]> {
    data.get(at..at + 4).map(|b| [b[0], b[1], b[2], b[3]])
}

/// Read `entry_count` fixed-size table entries that follow a FullBox header.
fn read_table<T>(data: &[u8], entry_size: usize, mut read: impl FnMut(&[u8]) -> T) -> Vec<T> {
    let Some(entry_count) = be_u32(data, 4) else {
        return Vec::new();
    };
    data.get(8..)
        .unwrap_or_default()
        .chunks_exact(entry_size)
        .take(entry_count as usize)
        .map(|entry| read(entry))
        .collect()
}

/// MP4 reader.
pub struct Mp4Reader<R> {
    reader: R,
    file_size: u64,
}

impl<R: Read + Seek> Mp4Reader<R> {
    /// Create a new MP4 reader.
    pub fn new(mut reader: R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, file_size })
    }

    /// Parse the movie box and its tracks.
    pub fn parse(&mut self) -> Result<Mp4File> {
        let mut mp4 = Mp4File {
            duration: 0,
            timescale: 1000,
            video_track: None,
            audio_track: None,
        };

        let atoms = self.read_atoms(0, self.file_size)?;

        if atoms.first().map(|a| a.atom_type) != Some(AtomType::FTYP)
            && !atoms.iter().any(|a| a.atom_type == AtomType::MOOV)
        {
            return Err(Error::invalid_mp4("no ftyp or moov at top level"));
        }

        let mut saw_moov = false;
        for atom in &atoms {
            if atom.atom_type == AtomType::MOOV {
                saw_moov = true;
                self.parse_moov(atom, &mut mp4)?;
            }
        }

        if !saw_moov {
            return Err(Error::MissingAtom("moov"));
        }

        Ok(mp4)
    }

    /// Read the atom headers between `start` and `end`.
    fn read_atoms(&mut self, start: u64, end: u64) -> Result<Vec<Atom>> {
        let mut atoms = Vec::new();
        let mut pos = start;

        while end.saturating_sub(pos) >= 8 {
            self.reader.seek(SeekFrom::Start(pos))?;

            let mut header = [0u8; 8];
            self.reader.read_exact(&mut header)?;

            let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
            let atom_type = AtomType::from_bytes([header[4], header[5], header[6], header[7]]);

            let (actual_size, header_size) = match size {
                1 => {
                    let mut ext = [0u8; 8];
                    self.reader.read_exact(&mut ext)?;
                    (u64::from_be_bytes(ext), 16u8)
                }
                0 => (end - pos, 8u8),
                _ => (size, 8u8),
            };

            if actual_size < header_size as u64 {
                return Err(Error::invalid_mp4(format!(
                    "atom {} at {} has size {} smaller than its header",
                    atom_type, pos, actual_size
                )));
            }

            let remaining = end - pos;
            if actual_size > remaining {
                // A truncated mdat is tolerated (samples past the end fail on read),
                // anything else means the index is damaged.
                if atom_type != AtomType::MDAT {
                    return Err(Error::invalid_mp4(format!(
                        "atom {} at {} has size {} but only {} bytes remain in its parent",
                        atom_type, pos, actual_size, remaining
                    )));
                }
                tracing::warn!(pos, size = actual_size, end, "Truncated mdat");
                atoms.push(Atom {
                    atom_type,
                    size: end - pos,
                    data_offset: pos + header_size as u64,
                    header_size,
                });
                break;
            }

            atoms.push(Atom {
                atom_type,
                size: actual_size,
                data_offset: pos + header_size as u64,
                header_size,
            });

            pos += actual_size;
        }

        Ok(atoms)
    }

    fn children(&mut self, parent: &Atom) -> Result<Vec<Atom>> {
        self.read_atoms(parent.data_offset, parent.end())
    }

    /// Read atom data, rejecting oversized atoms.
    fn read_atom_data(&mut self, atom: &Atom) -> Result<Vec<u8>> {
        let size = atom.data_size();
        if size > MAX_ATOM_DATA_SIZE {
            return Err(Error::invalid_mp4(format!(
                "Atom {} data size {} exceeds maximum {}",
                atom.atom_type, size, MAX_ATOM_DATA_SIZE
            )));
        }
        self.reader.seek(SeekFrom::Start(atom.data_offset))?;
        let mut data = vec![0u8; size as usize];
        self.reader.read_exact(&mut data)?;
        Ok(data)
    }

    fn parse_moov(&mut self, moov: &Atom, mp4: &mut Mp4File) -> Result<()> {
        for child in &self.children(moov)? {
            match child.atom_type {
                AtomType::MVHD => self.parse_mvhd(child, mp4)?,
                AtomType::TRAK => {
                    let track = match self.parse_trak(child) {
                        Ok(track) => track,
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping unreadable track");
                            continue;
                        }
                    };
                    let slot = match track.handler_type.track_kind() {
                        Some(TrackKind::Video) => &mut mp4.video_track,
                        Some(TrackKind::Audio) => &mut mp4.audio_track,
                        None => {
                            tracing::debug!(
                                track_id = track.track_id,
                                handler = ?track.handler_type,
                                "Ignoring non-media track"
                            );
                            continue;
                        }
                    };
                    if slot.is_none() {
                        *slot = Some(track);
                    } else {
                        tracing::debug!(track_id = track.track_id, "Ignoring extra track");
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Parse mvhd (movie header).
    fn parse_mvhd(&mut self, atom: &Atom, mp4: &mut Mp4File) -> Result<()> {
        let data = self.read_atom_data(atom)?;
        let parsed = match data.first() {
            Some(0) => be_u32(&data, 12).zip(be_u32(&data, 16).map(u64::from)),
            Some(_) => be_u32(&data, 20).zip(be_u64(&data, 24)),
            None => None,
        };
        let (timescale, duration) =
            parsed.ok_or_else(|| Error::invalid_mp4("mvhd is truncated"))?;
        mp4.timescale = timescale;
        mp4.duration = duration;
        Ok(())
    }

    fn parse_trak(&mut self, trak: &Atom) -> Result<TrackInfo> {
        let mut track = TrackInfo::new(0);

        for child in &self.children(trak)? {
            match child.atom_type {
                AtomType::TKHD => self.parse_tkhd(child, &mut track)?,
                AtomType::MDIA => self.parse_mdia(child, &mut track)?,
                _ => {}
            }
        }

        Ok(track)
    }

    /// Parse tkhd (track header).
    fn parse_tkhd(&mut self, atom: &Atom, track: &mut TrackInfo) -> Result<()> {
        let data = self.read_atom_data(atom)?;
        // (track_id offset, width offset) per version; width/height are 16.16 fixed point
        let (id_at, dims_at) = match data.first() {
            Some(0) => (12, 76),
            Some(_) => (20, 88),
            None => return Ok(()),
        };

        if let Some(id) = be_u32(&data, id_at) {
            track.track_id = id;
        }
        if let (Some(w), Some(h)) = (be_u32(&data, dims_at), be_u32(&data, dims_at + 4)) {
            if w > 0 && h > 0 {
                track.width = Some(w >> 16);
                track.height = Some(h >> 16);
            }
        }

        Ok(())
    }

    fn parse_mdia(&mut self, mdia: &Atom, track: &mut TrackInfo) -> Result<()> {
        let children = self.children(mdia)?;

        // hdlr first: stsd parsing depends on the handler type
        for child in children.iter().filter(|c| c.atom_type == AtomType::HDLR) {
            self.parse_hdlr(child, track)?;
        }

        for child in &children {
            match child.atom_type {
                AtomType::MDHD => self.parse_mdhd(child, track)?,
                AtomType::MINF => self.parse_minf(child, track)?,
                _ => {}
            }
        }

        Ok(())
    }

    /// Parse mdhd (media header).
    fn parse_mdhd(&mut self, atom: &Atom, track: &mut TrackInfo) -> Result<()> {
        let data = self.read_atom_data(atom)?;
        let parsed = match data.first() {
            Some(0) => be_u32(&data, 12).zip(be_u32(&data, 16).map(u64::from)),
            Some(_) => be_u32(&data, 20).zip(be_u64(&data, 24)),
            None => None,
        };
        let (timescale, duration) =
            parsed.ok_or_else(|| Error::invalid_mp4("mdhd is truncated"))?;
        if timescale == 0 {
            return Err(Error::invalid_mp4("mdhd timescale is zero"));
        }
        track.timescale = timescale;
        track.duration = duration;
        Ok(())
    }

    /// Parse hdlr (handler) atom.
    fn parse_hdlr(&mut self, atom: &Atom, track: &mut TrackInfo) -> Result<()> {
        let data = self.read_atom_data(atom)?;
        if let Some(handler) = fourcc(&data, 8) {
            track.handler_type = HandlerType::from_bytes(handler);
        }
        Ok(())
    }

    fn parse_minf(&mut self, minf: &Atom, track: &mut TrackInfo) -> Result<()> {
        for child in &self.children(minf)? {
            if child.atom_type == AtomType::STBL {
                self.parse_stbl(child, track)?;
            }
        }
        Ok(())
    }

    /// Parse stbl (sample table) atom.
    fn parse_stbl(&mut self, stbl: &Atom, track: &mut TrackInfo) -> Result<()> {
        let mut builder = SampleTableBuilder::new();

        for child in &self.children(stbl)? {
            let atom_type = child.atom_type;
            if !matches!(
                atom_type,
                AtomType::STTS
                    | AtomType::STSS
                    | AtomType::STSC
                    | AtomType::STSZ
                    | AtomType::STCO
                    | AtomType::CO64
                    | AtomType::CTTS
                    | AtomType::STSD
            ) {
                continue;
            }

            let data = self.read_atom_data(child)?;
            match atom_type {
                AtomType::STTS => builder.set_stts(read_table(&data, 8, |e| {
                    (be_u32(e, 0).unwrap_or(0), be_u32(e, 4).unwrap_or(0))
                })),
                AtomType::STSS => {
                    builder.set_sync_samples(read_table(&data, 4, |e| be_u32(e, 0).unwrap_or(0)))
                }
                AtomType::STSC => builder.set_stsc(read_table(&data, 12, |e| {
                    (
                        be_u32(e, 0).unwrap_or(0),
                        be_u32(e, 4).unwrap_or(0),
                        be_u32(e, 8).unwrap_or(0),
                    )
                })),
                AtomType::STSZ => Self::parse_stsz(&data, self.file_size, &mut builder)?,
                AtomType::STCO => builder.set_chunk_offsets(read_table(&data, 4, |e| {
                    be_u32(e, 0).unwrap_or(0) as u64
                })),
                AtomType::CO64 => builder
                    .set_chunk_offsets(read_table(&data, 8, |e| be_u64(e, 0).unwrap_or(0))),
                AtomType::CTTS => {
                    // Version 0 offsets are unsigned on paper but signed in practice
                    builder.set_ctts(read_table(&data, 8, |e| {
                        (
                            be_u32(e, 0).unwrap_or(0),
                            be_u32(e, 4).unwrap_or(0) as i32,
                        )
                    }))
                }
                AtomType::STSD => Self::parse_stsd(&data, track),
                _ => {}
            }
        }

        track.sample_table = builder.build();
        Ok(())
    }

    /// Parse stsz (sample size). Samples must fit in the `file_size` bytes
    /// of the source.
    fn parse_stsz(data: &[u8], file_size: u64, builder: &mut SampleTableBuilder) -> Result<()> {
        let (uniform_size, sample_count) = be_u32(data, 4)
            .zip(be_u32(data, 8))
            .ok_or_else(|| Error::invalid_mp4("stsz is truncated"))?;

        let uniform_total = uniform_size as u64 * sample_count as u64;
        if uniform_total > file_size {
            return Err(Error::invalid_mp4(format!(
                "stsz declares {} samples of {} bytes in a {} byte file",
                sample_count, uniform_size, file_size
            )));
        }

        let sizes = if uniform_size == 0 {
            let sizes: Vec<u32> = data[12..]
                .chunks_exact(4)
                .take(sample_count as usize)
                .map(|e| u32::from_be_bytes([e[0], e[1], e[2], e[3]]))
                .collect();
            if sizes.len() < sample_count as usize {
                return Err(Error::invalid_mp4(format!(
                    "stsz declares {} samples but holds {}",
                    sample_count,
                    sizes.len()
                )));
            }
            sizes
        } else {
            Vec::new()
        };

        builder.set_stsz(uniform_size, sample_count, sizes);
        Ok(())
    }

    /// Parse stsd (sample description): entry fourcc, dimensions/channels and
    /// the codec configuration box.
    fn parse_stsd(data: &[u8], track: &mut TrackInfo) {
        let Some(entry_type) = fourcc(data, 12) else {
            return;
        };
        track.sample_entry = Some(entry_type);

        let (children_at, wanted): (usize, &[&[u8; 4]]) = if track.handler_type.is_audio() {
            // AudioSampleEntry: [32..34] channelCount, [40..44] sampleRate (16.16)
            if let (Some(channels), Some(rate)) = (be_u16(data, 32), be_u32(data, 40)) {
                track.channels = Some(channels);
                track.sample_rate = Some(rate >> 16);
            }
            (AUDIO_ENTRY_CHILDREN, &[b"esds"])
        } else if track.handler_type.is_video() {
            // VisualSampleEntry: [40..42] width, [42..44] height
            if let (Some(w), Some(h)) = (be_u16(data, 40), be_u16(data, 42)) {
                if track.width.is_none() && w > 0 {
                    track.width = Some(w as u32);
                    track.height = Some(h as u32);
                }
            }
            (VISUAL_ENTRY_CHILDREN, &[b"avcC", b"hvcC"])
        } else {
            return;
        };

        // Sample entry ends at 8 + its declared size
        let entry_end = be_u32(data, 8)
            .map(|size| (8 + size as usize).min(data.len()))
            .unwrap_or(data.len());

        let mut pos = children_at;
        while pos + 8 <= entry_end {
            let box_size = be_u32(data, pos).unwrap_or(0) as usize;
            if box_size < 8 || pos + box_size > entry_end {
                break;
            }
            if let Some(box_type) = fourcc(data, pos + 4) {
                if wanted.contains(&&box_type) {
                    track.codec_data = Some(data[pos + 8..pos + box_size].to_vec());
                    break;
                }
            }
            pos += box_size;
        }
    }
}
