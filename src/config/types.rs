use serde::{Deserialize, Serialize};

/// Engine tuning shared by every clip created with the same options.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub decode: DecodeConfig,

    #[serde(default)]
    pub thumbnail: ThumbnailConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DecodeConfig {
    /// Decoded video frames held ahead of the tick cursor.
    #[serde(default = "default_lookahead_frames")]
    pub lookahead_frames: usize,

    /// Decoded audio frames held ahead of the tick cursor. Audio frames are
    /// short, so this is larger than the video window.
    #[serde(default = "default_audio_lookahead_frames")]
    pub audio_lookahead_frames: usize,

    /// How far (µs) a forward jump may go before the scheduler seeks instead
    /// of decoding through.
    #[serde(default = "default_seek_forward_threshold_us")]
    pub seek_forward_threshold_us: u64,
}

fn default_lookahead_frames() -> usize {
    8
}

fn default_audio_lookahead_frames() -> usize {
    32
}

fn default_seek_forward_threshold_us() -> u64 {
    3_000_000
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            lookahead_frames: default_lookahead_frames(),
            audio_lookahead_frames: default_audio_lookahead_frames(),
            seek_forward_threshold_us: default_seek_forward_threshold_us(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ThumbnailConfig {
    /// Spacing between thumbnails on the edited timeline (µs).
    #[serde(default = "default_interval_us")]
    pub interval_us: u64,

    /// Output width in pixels; height follows the aspect ratio.
    #[serde(default = "default_thumbnail_width")]
    pub width: u32,
}

fn default_interval_us() -> u64 {
    7_000_000
}

fn default_thumbnail_width() -> u32 {
    100
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            interval_us: default_interval_us(),
            width: default_thumbnail_width(),
        }
    }
}

/// Per-clip options.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClipOptions {
    /// Decode the audio track when the container has one.
    #[serde(default = "default_audio")]
    pub audio: bool,

    /// Linear gain applied to decoded audio samples.
    #[serde(default = "default_volume")]
    pub volume: f32,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_audio() -> bool {
    true
}

fn default_volume() -> f32 {
    1.0
}

impl Default for ClipOptions {
    fn default() -> Self {
        Self {
            audio: default_audio(),
            volume: default_volume(),
            engine: EngineConfig::default(),
        }
    }
}

impl ClipOptions {
    /// Options with an explicit engine configuration.
    pub fn with_engine(engine: EngineConfig) -> Self {
        Self {
            engine,
            ..Self::default()
        }
    }

    /// Disable audio decoding.
    pub fn without_audio(mut self) -> Self {
        self.audio = false;
        self
    }
}
