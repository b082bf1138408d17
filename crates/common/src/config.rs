//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Framing config file used when none is passed on the command line.
    pub framing_config: Option<PathBuf>,

    /// Default render settings.
    pub render: RenderDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// ffmpeg executable used for decoding and encoding.
    pub ffmpeg_bin: String,

    /// ffprobe executable used to inspect sources.
    pub ffprobe_bin: String,

    /// Video codec passed to the encoder.
    pub video_codec: String,

    /// Constant rate factor for the encoder.
    pub crf: u8,

    /// Encoder preset.
    pub preset: String,

    /// Frame rate assumed for image-sequence sources.
    pub sequence_fps: f64,

    /// Log render progress every N frames.
    pub progress_interval_frames: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reframe_core=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            video_codec: "libx264".to_string(),
            crf: 18,
            preset: "medium".to_string(),
            sequence_fps: 30.0,
            progress_interval_frames: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Force `debug` when `verbose` is set.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.level = "debug".to_string();
        }
        self
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reframe").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"render": {"crf": 23}, "logging": {"json": true}}"#).unwrap();
        assert_eq!(config.render.crf, 23);
        assert_eq!(config.render.ffmpeg_bin, "ffmpeg");
        assert_eq!(config.render.progress_interval_frames, 100);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert!(config.framing_config.is_none());
    }

    #[test]
    fn test_config_path_ends_with_app_dir() {
        let path = config_file_path();
        assert!(path.ends_with("reframe/config.json"));
    }
}
