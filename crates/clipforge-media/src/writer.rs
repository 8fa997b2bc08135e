//! Minimal progressive MP4 writer.
//!
//! Produces `ftyp + moov + mdat` files with one avc1 video track and/or one
//! mp4a audio track. Sample payloads are synthetic: each sample starts with its
//! 4-byte big-endian decode index followed by its track's fill byte, so test
//! decoders can tell exactly which chunk they were handed.

use bytes::{BufMut, BytesMut};

/// Video track layout.
#[derive(Debug, Clone)]
pub struct VideoSpec {
    pub width: u16,
    pub height: u16,
    pub timescale: u32,
    /// Ticks per frame.
    pub frame_duration: u32,
    pub frame_count: u32,
    /// Every n-th frame is a sync sample.
    pub keyframe_interval: u32,
}

impl VideoSpec {
    /// 24 fps at a 12288 timescale (512 ticks per frame), keyframe every 2 s.
    pub fn fps24(seconds: u32) -> Self {
        Self {
            width: 640,
            height: 360,
            timescale: 12_288,
            frame_duration: 512,
            frame_count: seconds * 24,
            keyframe_interval: 48,
        }
    }
}

/// Audio track layout.
#[derive(Debug, Clone)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
    /// PCM frames per encoded sample (1024 for AAC).
    pub frame_duration: u32,
    pub frame_count: u32,
}

impl AudioSpec {
    /// AAC-LC framing at 44.1 kHz stereo.
    pub fn aac(seconds: u32) -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            frame_duration: 1024,
            frame_count: (seconds as u64 * 44_100).div_ceil(1024) as u32,
        }
    }
}

/// Builder for synthetic MP4 files.
#[derive(Debug, Clone, Default)]
pub struct Mp4Writer {
    video: Option<VideoSpec>,
    audio: Option<AudioSpec>,
    sample_size: u32,
}

const MOVIE_TIMESCALE: u32 = 1000;

impl Mp4Writer {
    pub fn new() -> Self {
        Self {
            video: None,
            audio: None,
            sample_size: 16,
        }
    }

    pub fn video(mut self, spec: VideoSpec) -> Self {
        self.video = Some(spec);
        self
    }

    pub fn audio(mut self, spec: AudioSpec) -> Self {
        self.audio = Some(spec);
        self
    }

    /// Bytes per encoded sample (minimum 5).
    pub fn sample_size(mut self, size: u32) -> Self {
        self.sample_size = size.max(5);
        self
    }

    /// Serialize the file.
    pub fn build(&self) -> Vec<u8> {
        let mut ftyp = BytesMut::new();
        write_box(&mut ftyp, b"ftyp", |b| {
            b.put_slice(b"isom");
            b.put_u32(0x200);
            for brand in [b"isom", b"iso2", b"avc1", b"mp41"] {
                b.put_slice(brand);
            }
        });

        // The moov size does not depend on chunk offset values, so a first
        // pass with zero offsets tells where mdat payload will begin.
        let moov_len = self.moov(0).len();
        let mdat_start = (ftyp.len() + moov_len + 8) as u64;
        let moov = self.moov(mdat_start);

        let mut out = BytesMut::with_capacity(mdat_start as usize + self.payload_len());
        out.put_slice(&ftyp);
        out.put_slice(&moov);
        write_box(&mut out, b"mdat", |b| {
            if let Some(video) = &self.video {
                self.put_samples(b, video.frame_count, 0xa0);
            }
            if let Some(audio) = &self.audio {
                self.put_samples(b, audio.frame_count, 0xb0);
            }
        });
        out.to_vec()
    }

    fn payload_len(&self) -> usize {
        let samples = self.video.as_ref().map_or(0, |v| v.frame_count)
            + self.audio.as_ref().map_or(0, |a| a.frame_count);
        samples as usize * self.sample_size as usize + 8
    }

    fn put_samples(&self, buf: &mut BytesMut, count: u32, fill: u8) {
        for i in 0..count {
            buf.put_u32(i);
            buf.put_bytes(fill, self.sample_size as usize - 4);
        }
    }

    fn movie_duration(&self) -> u64 {
        let video = self.video.as_ref().map_or(0, |v| {
            v.frame_count as u64 * v.frame_duration as u64 * MOVIE_TIMESCALE as u64
                / v.timescale as u64
        });
        let audio = self.audio.as_ref().map_or(0, |a| {
            a.frame_count as u64 * a.frame_duration as u64 * MOVIE_TIMESCALE as u64
                / a.sample_rate as u64
        });
        video.max(audio)
    }

    fn moov(&self, mdat_start: u64) -> BytesMut {
        let mut buf = BytesMut::new();
        write_box(&mut buf, b"moov", |b| {
            write_full_box(b, b"mvhd", 0, |b| {
                b.put_u32(0); // creation time
                b.put_u32(0); // modification time
                b.put_u32(MOVIE_TIMESCALE);
                b.put_u32(self.movie_duration() as u32);
                b.put_u32(0x00010000); // rate
                b.put_u16(0x0100); // volume
                b.put_bytes(0, 10);
                put_matrix(b);
                b.put_bytes(0, 24);
                b.put_u32(3); // next track ID
            });

            let mut next_offset = mdat_start;
            if let Some(video) = &self.video {
                self.video_trak(b, video, next_offset);
                next_offset += video.frame_count as u64 * self.sample_size as u64;
            }
            if let Some(audio) = &self.audio {
                self.audio_trak(b, audio, next_offset);
            }
        });
        buf
    }

    fn video_trak(&self, buf: &mut BytesMut, spec: &VideoSpec, chunk_offset: u64) {
        write_box(buf, b"trak", |b| {
            put_tkhd(b, 1, spec.width, spec.height);
            write_box(b, b"mdia", |b| {
                put_mdhd(
                    b,
                    spec.timescale,
                    spec.frame_count as u64 * spec.frame_duration as u64,
                );
                put_hdlr(b, b"vide");
                write_box(b, b"minf", |b| {
                    write_box(b, b"stbl", |b| {
                        write_full_box(b, b"stsd", 0, |b| {
                            b.put_u32(1);
                            write_box(b, b"avc1", |b| {
                                b.put_bytes(0, 6);
                                b.put_u16(1); // data reference index
                                b.put_bytes(0, 16);
                                b.put_u16(spec.width);
                                b.put_u16(spec.height);
                                b.put_u32(0x00480000); // 72 dpi
                                b.put_u32(0x00480000);
                                b.put_u32(0);
                                b.put_u16(1); // frame count
                                b.put_bytes(0, 32); // compressor name
                                b.put_u16(0x0018); // depth
                                b.put_i16(-1);
                                write_box(b, b"avcC", |b| {
                                    b.put_slice(&[0x01, 0x64, 0x00, 0x1f, 0xff, 0xe0, 0x00]);
                                });
                            });
                        });
                        put_stts(b, spec.frame_count, spec.frame_duration);
                        let interval = spec.keyframe_interval.max(1);
                        let sync: Vec<u32> = (0..spec.frame_count)
                            .step_by(interval as usize)
                            .map(|i| i + 1)
                            .collect();
                        write_full_box(b, b"stss", 0, |b| {
                            b.put_u32(sync.len() as u32);
                            for n in &sync {
                                b.put_u32(*n);
                            }
                        });
                        self.put_chunk_layout(b, spec.frame_count, chunk_offset);
                    });
                });
            });
        });
    }

    fn audio_trak(&self, buf: &mut BytesMut, spec: &AudioSpec, chunk_offset: u64) {
        write_box(buf, b"trak", |b| {
            put_tkhd(b, 2, 0, 0);
            write_box(b, b"mdia", |b| {
                put_mdhd(
                    b,
                    spec.sample_rate,
                    spec.frame_count as u64 * spec.frame_duration as u64,
                );
                put_hdlr(b, b"soun");
                write_box(b, b"minf", |b| {
                    write_box(b, b"stbl", |b| {
                        write_full_box(b, b"stsd", 0, |b| {
                            b.put_u32(1);
                            write_box(b, b"mp4a", |b| {
                                b.put_bytes(0, 6);
                                b.put_u16(1);
                                b.put_bytes(0, 8); // version, revision, vendor
                                b.put_u16(spec.channels);
                                b.put_u16(16); // sample size
                                b.put_u32(0); // compression ID, packet size
                                b.put_u32(spec.sample_rate << 16);
                                write_full_box(b, b"esds", 0, |b| {
                                    put_aac_es_descriptor(b, spec);
                                });
                            });
                        });
                        put_stts(b, spec.frame_count, spec.frame_duration);
                        self.put_chunk_layout(b, spec.frame_count, chunk_offset);
                    });
                });
            });
        });
    }

    /// stsc/stsz/stco for a track stored as a single contiguous chunk.
    fn put_chunk_layout(&self, buf: &mut BytesMut, count: u32, offset: u64) {
        write_full_box(buf, b"stsc", 0, |b| {
            b.put_u32(1);
            b.put_u32(1);
            b.put_u32(count);
            b.put_u32(1);
        });
        write_full_box(buf, b"stsz", 0, |b| {
            b.put_u32(self.sample_size);
            b.put_u32(count);
        });
        write_full_box(buf, b"stco", 0, |b| {
            b.put_u32(1);
            b.put_u32(offset as u32);
        });
    }
}

/// Write a box, patching its size once `body` has run.
fn write_box(buf: &mut BytesMut, fourcc: &[u8; 4], body: impl FnOnce(&mut BytesMut)) {
    let start = buf.len();
    buf.put_u32(0);
    buf.put_slice(fourcc);
    body(buf);
    let size = (buf.len() - start) as u32;
    buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
}

fn write_full_box(
    buf: &mut BytesMut,
    fourcc: &[u8; 4],
    version: u8,
    body: impl FnOnce(&mut BytesMut),
) {
    write_box(buf, fourcc, |b| {
        b.put_u8(version);
        b.put_bytes(0, 3);
        body(b);
    });
}

fn put_matrix(buf: &mut BytesMut) {
    for v in [0x00010000u32, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000] {
        buf.put_u32(v);
    }
}

fn put_tkhd(buf: &mut BytesMut, track_id: u32, width: u16, height: u16) {
    write_full_box(buf, b"tkhd", 0, |b| {
        b.put_u32(0);
        b.put_u32(0);
        b.put_u32(track_id);
        b.put_u32(0);
        b.put_u32(0); // duration
        b.put_bytes(0, 8);
        b.put_u16(0); // layer
        b.put_u16(0); // alternate group
        b.put_u16(if width == 0 { 0x0100 } else { 0 }); // volume
        b.put_u16(0);
        put_matrix(b);
        b.put_u32((width as u32) << 16);
        b.put_u32((height as u32) << 16);
    });
}

fn put_mdhd(buf: &mut BytesMut, timescale: u32, duration: u64) {
    write_full_box(buf, b"mdhd", 0, |b| {
        b.put_u32(0);
        b.put_u32(0);
        b.put_u32(timescale);
        b.put_u32(duration as u32);
        b.put_u16(0x55c4); // und
        b.put_u16(0);
    });
}

fn put_hdlr(buf: &mut BytesMut, handler: &[u8; 4]) {
    write_full_box(buf, b"hdlr", 0, |b| {
        b.put_u32(0);
        b.put_slice(handler);
        b.put_bytes(0, 12);
        b.put_u8(0); // empty name
    });
}

fn put_stts(buf: &mut BytesMut, count: u32, delta: u32) {
    write_full_box(buf, b"stts", 0, |b| {
        b.put_u32(1);
        b.put_u32(count);
        b.put_u32(delta);
    });
}

fn put_aac_es_descriptor(buf: &mut BytesMut, spec: &AudioSpec) {
    let freq_index: u8 = match spec.sample_rate {
        96_000 => 0,
        88_200 => 1,
        64_000 => 2,
        48_000 => 3,
        44_100 => 4,
        32_000 => 5,
        24_000 => 6,
        22_050 => 7,
        16_000 => 8,
        _ => 4,
    };
    // AudioSpecificConfig: AAC-LC (2), frequency index, channel configuration
    let asc = [
        (2 << 3) | (freq_index >> 1),
        ((freq_index & 1) << 7) | ((spec.channels as u8 & 0x0f) << 3),
    ];

    buf.put_slice(&[0x03, 0x19, 0x00, 0x01, 0x00]);
    buf.put_slice(&[0x04, 0x11, 0x40, 0x15, 0x00, 0x00, 0x00]);
    buf.put_u32(128_000);
    buf.put_u32(128_000);
    buf.put_slice(&[0x05, 0x02]);
    buf.put_slice(&asc);
    buf.put_slice(&[0x06, 0x01, 0x02]);
}
