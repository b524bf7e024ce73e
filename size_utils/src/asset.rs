//! Asset metadata
//!
//! `AssetProfile` is the read-only view of an input that both estimators work
//! from. Zero means "unknown" for every numeric field; estimators treat that
//! as a boundary case rather than an error.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ProbeError;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetProfile {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub has_audio: bool,
}

impl AssetProfile {
    /// Profile with every field unknown.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn new(duration_secs: f64, width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            duration_secs,
            width,
            height,
            frame_rate,
            has_audio: false,
        }
        .sanitized()
    }

    pub fn still(width: u32, height: u32) -> Self {
        Self::new(0.0, width, height, 0.0)
    }

    pub fn with_audio(mut self, has_audio: bool) -> Self {
        self.has_audio = has_audio;
        self
    }

    /// Negative or non-finite durations and frame rates become 0 (unknown).
    pub fn sanitized(mut self) -> Self {
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            self.duration_secs = 0.0;
        }
        if !self.frame_rate.is_finite() || self.frame_rate < 0.0 {
            self.frame_rate = 0.0;
        }
        self
    }

    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn has_duration(&self) -> bool {
        self.duration_secs > 0.0
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

// ============================================================================
// TimeEdit - trim + retime
// ============================================================================

/// Trim range (fractions of the source duration) and playback speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeEdit {
    pub trim_start: f64,
    pub trim_end: f64,
    pub speed: f64,
}

impl Default for TimeEdit {
    fn default() -> Self {
        Self {
            trim_start: 0.0,
            trim_end: 1.0,
            speed: 1.0,
        }
    }
}

impl TimeEdit {
    pub fn trimmed(trim_start: f64, trim_end: f64) -> Self {
        Self {
            trim_start,
            trim_end,
            ..Self::default()
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    fn bounds(&self) -> (f64, f64) {
        let start = if self.trim_start.is_finite() {
            self.trim_start.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let end = if self.trim_end.is_finite() {
            self.trim_end.clamp(0.0, 1.0)
        } else {
            1.0
        };
        (start, end.max(start))
    }

    pub fn playback_speed(&self) -> f64 {
        if self.speed.is_finite() && self.speed > 0.0 {
            self.speed
        } else {
            1.0
        }
    }

    /// Output duration: `(end - start) × duration / speed`.
    pub fn effective_duration(&self, source_duration: f64) -> f64 {
        if !source_duration.is_finite() || source_duration <= 0.0 {
            return 0.0;
        }
        let (start, end) = self.bounds();
        (end - start) * source_duration / self.playback_speed()
    }

    /// Length of the kept range in source time, before retiming.
    pub fn source_span(&self, source_duration: f64) -> f64 {
        if !source_duration.is_finite() || source_duration <= 0.0 {
            return 0.0;
        }
        let (start, end) = self.bounds();
        (end - start) * source_duration
    }

    /// Source timestamp where the kept range begins.
    pub fn source_offset(&self, source_duration: f64) -> f64 {
        if !source_duration.is_finite() || source_duration <= 0.0 {
            return 0.0;
        }
        self.bounds().0 * source_duration
    }

    /// Applies the edit to a profile's duration.
    pub fn apply(&self, profile: &AssetProfile) -> AssetProfile {
        AssetProfile {
            duration_secs: self.effective_duration(profile.duration_secs),
            ..*profile
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// AssetProbe
// ============================================================================

/// Source of `AssetProfile`s. The ffprobe implementation lives in
/// [`crate::ffprobe::FfprobeProbe`]; tests use closures.
pub trait AssetProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<AssetProfile, ProbeError>;
}

impl<F> AssetProbe for F
where
    F: Fn(&Path) -> Result<AssetProfile, ProbeError> + Send + Sync,
{
    fn probe(&self, path: &Path) -> Result<AssetProfile, ProbeError> {
        self(path)
    }
}
