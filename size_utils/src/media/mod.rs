//! Media-type adapters
//!
//! Each adapter plugs one media family into the shared estimator and search:
//! its two ladder tables, its heuristic formula, its sample window policy and
//! the translation of a preset into transcoder-facing settings.
//!
//! - `gif`: palette GIFs (dither, fps, colours, resolution)
//! - `image`: stills (quality, resolution, output format)
//! - `video`: CRF video (crf, resolution, audio bitrate, codec)
//! - `resize`: the user's own resize choice, composed with preset scaling

pub mod gif;
pub mod image;
pub mod resize;
pub mod video;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::asset::AssetProfile;
use crate::calibration::SampleWindow;
use crate::config::OptimizerConfig;
use crate::errors::CalibrationError;
use crate::heuristic::HeuristicEstimate;
use crate::ladder::{LadderVariant, PresetLadder};

pub use gif::{GifAdapter, GifDither, GifParams, GifPreset, GifSettings};
pub use image::{ImageAdapter, ImageFormat, ImageParams, ImagePreset, ImageSettings};
pub use resize::UserResize;
pub use video::{VideoAdapter, VideoCodec, VideoParams, VideoPreset, VideoSettings};

/// Version tag carried by every built-in ladder. Bump whenever a factor
/// table is recalibrated.
pub const FACTOR_TABLE_VERSION: &str = "2026.10-r1";

/// Reference rung of every built-in ladder.
pub const BUILTIN_REFERENCE_INDEX: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Gif,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Image, MediaKind::Video, MediaKind::Gif];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Gif => "gif",
        }
    }

    /// Guesses the kind from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "gif" => Some(MediaKind::Gif),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tif" | "tiff" | "heic" | "heif"
            | "avif" => Some(MediaKind::Image),
            "mp4" | "m4v" | "mov" | "mkv" | "webm" | "avi" | "wmv" | "flv" | "mpg" | "mpeg"
            | "ts" | "3gp" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Whether samples are time windows rather than the whole still.
    pub fn is_timed(&self) -> bool {
        !matches!(self, MediaKind::Image)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One media family's contribution to the optimizer.
///
/// `heuristic` receives the profile already passed through
/// `effective_profile` (trim, retime and user resize applied); the preset's
/// own resolution scale is applied inside the formula.
pub trait MediaAdapter: Send + Sync {
    /// Caller's current parameters (everything the ladder does not vary).
    type Params: Clone + fmt::Debug + Send + Sync;
    /// One rung of the ladder.
    type Preset: Clone + fmt::Debug + Serialize + Send + Sync;
    /// Concrete transcoder-facing settings.
    type Settings: Clone + fmt::Debug + Serialize;

    fn kind(&self) -> MediaKind;

    fn ladder(&self, variant: LadderVariant) -> &PresetLadder<Self::Preset>;

    fn effective_profile(&self, source: &AssetProfile, params: &Self::Params) -> AssetProfile;

    fn sample_window(
        &self,
        source: &AssetProfile,
        params: &Self::Params,
        config: &OptimizerConfig,
    ) -> Result<SampleWindow, CalibrationError>;

    fn heuristic(
        &self,
        profile: &AssetProfile,
        params: &Self::Params,
        preset: &Self::Preset,
    ) -> HeuristicEstimate;

    fn build_settings(
        &self,
        source: &AssetProfile,
        params: &Self::Params,
        preset: &Self::Preset,
    ) -> Self::Settings;

    /// Short human-readable label ("15fps, 128 colors, bayer:4").
    fn describe(&self, preset: &Self::Preset) -> String;

    /// Preset resolution scale in `(0, 1]`.
    fn resolution_scale(&self, preset: &Self::Preset) -> f64;
}

/// `percent / 100` as a scale factor, clamped to `(0, 1]`.
pub(crate) fn percent_scale(percent: u32) -> f64 {
    (percent.clamp(1, 100) as f64) / 100.0
}
