mod types;

pub use types::*;

use crate::error::{ClipError, Result};
use std::path::Path;

/// Load engine configuration from a TOML file
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)?;

    let config: EngineConfig = toml::from_str(&content).map_err(|e| {
        ClipError::config(format!("Failed to parse config file {:?}: {}", path, e))
    })?;

    validate_config(&config)?;

    tracing::debug!(path = ?path, "Loaded engine config");
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./clipforge.toml", "~/.config/clipforge/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(EngineConfig::default())
}

/// Validate configuration
pub fn validate_config(config: &EngineConfig) -> Result<()> {
    if config.decode.lookahead_frames == 0 {
        return Err(ClipError::config("decode.lookahead_frames must be at least 1"));
    }
    if config.decode.audio_lookahead_frames == 0 {
        return Err(ClipError::config("decode.audio_lookahead_frames must be at least 1"));
    }
    if config.thumbnail.interval_us == 0 {
        return Err(ClipError::config("thumbnail.interval_us cannot be 0"));
    }
    if config.thumbnail.width == 0 {
        return Err(ClipError::config("thumbnail.width cannot be 0"));
    }

    Ok(())
}
