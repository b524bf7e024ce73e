//! Optimizer configuration
//!
//! Defaults follow the values the converter has always used; every field can
//! be overridden from a JSON file or from the command line.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::media::MediaKind;

// ============================================================================
// Defaults
// ============================================================================

/// GIF calibration sample length (seconds).
pub const DEFAULT_GIF_SAMPLE_SECONDS: f64 = 1.5;

/// Video calibration sample length (seconds).
pub const DEFAULT_VIDEO_SAMPLE_SECONDS: f64 = 2.0;

/// Below this the asset is too short to sample.
pub const DEFAULT_MIN_SAMPLE_SECONDS: f64 = 0.3;

pub const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_VIDEO_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_GIF_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// OptimizerConfig
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Overrides the per-media default sample length.
    pub sample_seconds: Option<f64>,
    pub min_sample_seconds: f64,
    pub image_timeout_secs: u64,
    pub video_timeout_secs: u64,
    pub gif_timeout_secs: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            sample_seconds: None,
            min_sample_seconds: DEFAULT_MIN_SAMPLE_SECONDS,
            image_timeout_secs: DEFAULT_IMAGE_TIMEOUT_SECS,
            video_timeout_secs: DEFAULT_VIDEO_TIMEOUT_SECS,
            gif_timeout_secs: DEFAULT_GIF_TIMEOUT_SECS,
        }
    }
}

impl OptimizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_seconds(mut self, seconds: f64) -> Self {
        self.sample_seconds = Some(seconds);
        self
    }

    pub fn with_min_sample_seconds(mut self, seconds: f64) -> Self {
        self.min_sample_seconds = seconds;
        self
    }

    pub fn with_timeout(mut self, kind: MediaKind, timeout: Duration) -> Self {
        let secs = timeout.as_secs().max(1);
        match kind {
            MediaKind::Image => self.image_timeout_secs = secs,
            MediaKind::Video => self.video_timeout_secs = secs,
            MediaKind::Gif => self.gif_timeout_secs = secs,
        }
        self
    }

    /// Loads a JSON config; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid optimizer config: {}", path.display()))
    }

    /// Sample length for a media kind, `0.0` for stills.
    pub fn sample_seconds_for(&self, kind: MediaKind) -> f64 {
        match kind {
            MediaKind::Image => 0.0,
            MediaKind::Video => self.sample_seconds.unwrap_or(DEFAULT_VIDEO_SAMPLE_SECONDS),
            MediaKind::Gif => self.sample_seconds.unwrap_or(DEFAULT_GIF_SAMPLE_SECONDS),
        }
    }

    pub fn timeout_for(&self, kind: MediaKind) -> Duration {
        let secs = match kind {
            MediaKind::Image => self.image_timeout_secs,
            MediaKind::Video => self.video_timeout_secs,
            MediaKind::Gif => self.gif_timeout_secs,
        };
        Duration::from_secs(secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = OptimizerConfig::default();
        assert_eq!(config.sample_seconds_for(MediaKind::Gif), 1.5);
        assert_eq!(config.sample_seconds_for(MediaKind::Video), 2.0);
        assert_eq!(config.sample_seconds_for(MediaKind::Image), 0.0);
        assert_eq!(config.timeout_for(MediaKind::Image), Duration::from_secs(30));
        assert_eq!(config.timeout_for(MediaKind::Video), Duration::from_secs(60));
    }

    #[test]
    fn test_builder_overrides() {
        let config = OptimizerConfig::new()
            .with_sample_seconds(1.0)
            .with_timeout(MediaKind::Gif, Duration::from_secs(5));
        assert_eq!(config.sample_seconds_for(MediaKind::Gif), 1.0);
        assert_eq!(config.sample_seconds_for(MediaKind::Video), 1.0);
        assert_eq!(config.timeout_for(MediaKind::Gif), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "sample_seconds": 1.0, "video_timeout_secs": 90 }}"#).unwrap();

        let config = OptimizerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.sample_seconds, Some(1.0));
        assert_eq!(config.video_timeout_secs, 90);
        assert_eq!(config.min_sample_seconds, DEFAULT_MIN_SAMPLE_SECONDS);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(OptimizerConfig::from_json_file(file.path()).is_err());
    }
}
