//! Codec identification from sample entries.
//!
//! Decoders are configured with a codec string in the RFC 6381 form used by
//! browsers and most hardware APIs (`avc1.64001f`, `mp4a.40.2`) plus an
//! optional binary description (avcC/hvcC record, AudioSpecificConfig).

use crate::mp4::TrackInfo;

/// ES_Descriptor tag inside esds.
const ES_DESCRIPTOR_TAG: u8 = 0x03;
/// DecoderConfigDescriptor tag.
const DECODER_CONFIG_TAG: u8 = 0x04;
/// DecoderSpecificInfo tag.
const DECODER_SPECIFIC_TAG: u8 = 0x05;

/// Codec string for a parsed track, falling back to the sample entry fourcc.
pub fn codec_string(track: &TrackInfo) -> String {
    let entry = track.sample_entry_str().unwrap_or("unknown");
    let data = track.codec_data.as_deref();

    match (entry, data) {
        ("avc1" | "avc3", Some(avcc)) if avcc.len() >= 4 => {
            format!("{}.{:02x}{:02x}{:02x}", entry, avcc[1], avcc[2], avcc[3])
        }
        ("mp4a", Some(esds)) => match parse_esds(esds) {
            Some(info) => match info.audio_object_type {
                Some(aot) => format!("mp4a.{:x}.{}", info.object_type, aot),
                None => format!("mp4a.{:x}", info.object_type),
            },
            None => "mp4a".to_string(),
        },
        _ => entry.to_string(),
    }
}

/// Binary decoder description for a track.
///
/// Video tracks use the whole avcC/hvcC payload; AAC tracks use the
/// AudioSpecificConfig carried in the esds DecoderSpecificInfo.
pub fn decoder_description(track: &TrackInfo) -> Option<Vec<u8>> {
    let data = track.codec_data.as_ref()?;
    if track.handler_type.is_audio() {
        parse_esds(data).and_then(|info| info.specific_info)
    } else {
        Some(data.clone())
    }
}

/// Fields of an esds box this crate cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsdsInfo {
    /// objectTypeIndication (0x40 = MPEG-4 audio).
    pub object_type: u8,
    /// Audio object type from the AudioSpecificConfig (2 = AAC-LC).
    pub audio_object_type: Option<u8>,
    /// Raw DecoderSpecificInfo payload.
    pub specific_info: Option<Vec<u8>>,
}

/// Parse an esds payload (FullBox version/flags included).
pub fn parse_esds(data: &[u8]) -> Option<EsdsInfo> {
    let mut cursor = DescriptorCursor::new(data.get(4..)?);

    let (tag, _) = cursor.descriptor_header()?;
    if tag != ES_DESCRIPTOR_TAG {
        return None;
    }
    cursor.skip(2)?; // ES_ID
    let flags = cursor.u8()?;
    if flags & 0x80 != 0 {
        cursor.skip(2)?; // dependsOn_ES_ID
    }
    if flags & 0x40 != 0 {
        let url_len = cursor.u8()? as usize;
        cursor.skip(url_len)?;
    }
    if flags & 0x20 != 0 {
        cursor.skip(2)?; // OCR_ES_Id
    }

    let (tag, _) = cursor.descriptor_header()?;
    if tag != DECODER_CONFIG_TAG {
        return None;
    }
    let object_type = cursor.u8()?;
    // streamType(1) bufferSizeDB(3) maxBitrate(4) avgBitrate(4)
    cursor.skip(12)?;

    let specific_info = match cursor.descriptor_header() {
        Some((DECODER_SPECIFIC_TAG, len)) => cursor.take(len).map(<[u8]>::to_vec),
        _ => None,
    };

    let audio_object_type = specific_info.as_deref().and_then(audio_object_type);

    Some(EsdsInfo {
        object_type,
        audio_object_type,
        specific_info,
    })
}

/// Audio object type from the first bits of an AudioSpecificConfig.
fn audio_object_type(asc: &[u8]) -> Option<u8> {
    let first = *asc.first()?;
    let aot = first >> 3;
    if aot == 31 {
        // escape: 32 + next 6 bits
        let second = *asc.get(1)?;
        Some(32 + (((first & 0x07) << 3) | (second >> 5)))
    } else {
        Some(aot)
    }
}

struct DescriptorCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DescriptorCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn u8(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn skip(&mut self, n: usize) -> Option<()> {
        self.take(n).map(|_| ())
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let slice = self.data.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(slice)
    }

    /// Tag plus the expandable (7 bits per byte) length.
    fn descriptor_header(&mut self) -> Option<(u8, usize)> {
        let tag = self.u8()?;
        let mut len = 0usize;
        for _ in 0..4 {
            let byte = self.u8()?;
            len = (len << 7) | (byte & 0x7f) as usize;
            if byte & 0x80 == 0 {
                break;
            }
        }
        Some((tag, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mp4::HandlerType;

    /// esds for AAC-LC, 44.1 kHz stereo (ASC = 0x12 0x10).
    fn aac_lc_esds() -> Vec<u8> {
        vec![
            0, 0, 0, 0, // version/flags
            0x03, 0x19, // ES_Descriptor, 25 bytes
            0x00, 0x01, // ES_ID
            0x00, // flags
            0x04, 0x11, // DecoderConfigDescriptor, 17 bytes
            0x40, // MPEG-4 audio
            0x15, // stream type
            0x00, 0x00, 0x00, // buffer size
            0x00, 0x01, 0xf4, 0x00, // max bitrate
            0x00, 0x01, 0xf4, 0x00, // avg bitrate
            0x05, 0x02, 0x12, 0x10, // DecoderSpecificInfo
            0x06, 0x01, 0x02, // SLConfig
        ]
    }

    #[test]
    fn test_avc_codec_string() {
        let mut track = TrackInfo::new(1);
        track.handler_type = HandlerType::Video;
        track.sample_entry = Some(*b"avc1");
        track.codec_data = Some(vec![0x01, 0x64, 0x00, 0x1f, 0xff]);
        assert_eq!(codec_string(&track), "avc1.64001f");
        assert_eq!(decoder_description(&track).unwrap().len(), 5);
    }

    #[test]
    fn test_aac_codec_string() {
        let mut track = TrackInfo::new(2);
        track.handler_type = HandlerType::Audio;
        track.sample_entry = Some(*b"mp4a");
        track.codec_data = Some(aac_lc_esds());
        assert_eq!(codec_string(&track), "mp4a.40.2");
        assert_eq!(decoder_description(&track), Some(vec![0x12, 0x10]));
    }

    #[test]
    fn test_unknown_entry_falls_back_to_fourcc() {
        let mut track = TrackInfo::new(1);
        track.sample_entry = Some(*b"hvc1");
        assert_eq!(codec_string(&track), "hvc1");

        let track = TrackInfo::new(1);
        assert_eq!(codec_string(&track), "unknown");
    }

    #[test]
    fn test_escaped_audio_object_type() {
        // 11111 000001 -> 32 + 1
        assert_eq!(audio_object_type(&[0xf8, 0x20]), Some(33));
        assert_eq!(audio_object_type(&[0x10]), Some(2));
    }

    #[test]
    fn test_truncated_esds() {
        assert!(parse_esds(&[0, 0, 0, 0, 0x03]).is_none());
    }
}
