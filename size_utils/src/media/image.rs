//! Still-image adapter
//!
//! Ladders vary the encoder quality (1-100) and, in the auto-resize variant,
//! the resolution. Calibration encodes the whole still once at the reference
//! quality; no duration extrapolation applies.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::resize::{scale_dimensions, UserResize};
use super::{percent_scale, MediaAdapter, MediaKind, BUILTIN_REFERENCE_INDEX, FACTOR_TABLE_VERSION};
use crate::asset::AssetProfile;
use crate::calibration::SampleWindow;
use crate::config::OptimizerConfig;
use crate::errors::CalibrationError;
use crate::heuristic::HeuristicEstimate;
use crate::ladder::{LadderVariant, PresetCandidate, PresetLadder};

// ============================================================================
// Output format
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Webp,
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
            ImageFormat::Png => "png",
        }
    }

    /// Container/marker overhead in bytes.
    fn header_bytes(&self) -> u64 {
        match self {
            ImageFormat::Jpeg => 620,
            ImageFormat::Webp => 60,
            ImageFormat::Png => 100,
        }
    }

    /// Bits per pixel at a given quality.
    fn bits_per_pixel(&self, quality: u32) -> f64 {
        let q = quality.clamp(1, 100) as f64 / 100.0;
        let jpeg = 0.08 + 2.4 * q.powi(3);
        match self {
            ImageFormat::Jpeg => jpeg,
            ImageFormat::Webp => jpeg * 0.7,
            ImageFormat::Png => 2.6 + 0.2 * q,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
            ImageFormat::Png => "png",
        })
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            "png" => Ok(ImageFormat::Png),
            other => Err(format!("unsupported image format '{}'", other)),
        }
    }
}

/// ffmpeg mjpeg `-q:v` (1 best, 31 worst) for a 1-100 quality.
pub fn jpeg_qscale(quality: u32) -> u32 {
    let q = quality.min(100) as f64 / 100.0;
    (31.0 - q * 30.0).max(1.0) as u32
}

/// PNG `-compression_level` (0-9); PNG is lossless, so quality only trades
/// encode time for size.
pub fn png_compression_level(quality: u32) -> u32 {
    9u32.saturating_sub(quality.min(100) / 11)
}

// ============================================================================
// Presets
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImagePreset {
    pub quality: u32,
    pub scale_percent: u32,
}

// (quality, scale %, relative size factor)
type ImageRow = (u32, u32, f64);

const STANDARD_TABLE: &[ImageRow] = &[
    (100, 100, 1.00),
    (95, 100, 0.85),
    (90, 100, 0.70),
    (85, 100, 0.58),
    (80, 100, 0.48),
    (75, 100, 0.40),
    (70, 100, 0.34),
    (65, 100, 0.29),
    (60, 100, 0.25), // reference
    (55, 100, 0.22),
    (50, 100, 0.19),
    (45, 100, 0.16),
    (40, 100, 0.14),
    (35, 100, 0.12),
    (30, 100, 0.10),
    (25, 100, 0.08),
    (20, 100, 0.06),
];

const AUTO_RESIZE_TABLE: &[ImageRow] = &[
    (100, 100, 1.00),
    (95, 100, 0.85),
    (90, 100, 0.70),
    (85, 100, 0.58),
    (80, 100, 0.48),
    (75, 100, 0.40),
    (70, 100, 0.34),
    (65, 100, 0.29),
    (60, 100, 0.25), // reference
    (55, 100, 0.22),
    (50, 100, 0.19),
    (55, 90, 0.18),
    (55, 80, 0.14),
    (50, 70, 0.10),
    (50, 60, 0.07),
    (45, 60, 0.058),
    (40, 60, 0.05),
    (35, 60, 0.043),
    (30, 60, 0.036),
    (25, 60, 0.029),
    (20, 60, 0.022),
];

fn build_ladder(name: &str, variant: LadderVariant, table: &[ImageRow]) -> PresetLadder<ImagePreset> {
    let candidates = table
        .iter()
        .map(|&(quality, scale_percent, factor)| {
            PresetCandidate::new(
                ImagePreset {
                    quality,
                    scale_percent,
                },
                factor,
            )
        })
        .collect();
    PresetLadder::unchecked(name, variant, BUILTIN_REFERENCE_INDEX, candidates)
        .with_table_version(FACTOR_TABLE_VERSION)
}

lazy_static! {
    static ref STANDARD_LADDER: PresetLadder<ImagePreset> =
        build_ladder("image/standard", LadderVariant::Standard, STANDARD_TABLE);
    static ref AUTO_RESIZE_LADDER: PresetLadder<ImagePreset> =
        build_ladder("image/auto_resize", LadderVariant::AutoResize, AUTO_RESIZE_TABLE);
}

// ============================================================================
// Params / Settings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageParams {
    pub format: ImageFormat,
    pub resize: UserResize,
}

impl ImageParams {
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            resize: UserResize::Original,
        }
    }

    pub fn with_resize(mut self, resize: UserResize) -> Self {
        self.resize = resize;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSettings {
    pub format: ImageFormat,
    pub quality: u32,
    pub dimensions: Option<(u32, u32)>,
}

impl ImageSettings {
    /// Encoder quality flags for ffmpeg.
    pub fn quality_args(&self) -> Vec<String> {
        match self.format {
            ImageFormat::Jpeg => vec!["-q:v".into(), jpeg_qscale(self.quality).to_string()],
            ImageFormat::Webp => vec!["-quality".into(), self.quality.min(100).to_string()],
            ImageFormat::Png => vec![
                "-compression_level".into(),
                png_compression_level(self.quality).to_string(),
            ],
        }
    }
}

// ============================================================================
// Adapter
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageAdapter;

impl ImageAdapter {
    pub fn standard_ladder() -> &'static PresetLadder<ImagePreset> {
        &STANDARD_LADDER
    }

    pub fn auto_resize_ladder() -> &'static PresetLadder<ImagePreset> {
        &AUTO_RESIZE_LADDER
    }
}

impl MediaAdapter for ImageAdapter {
    type Params = ImageParams;
    type Preset = ImagePreset;
    type Settings = ImageSettings;

    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    fn ladder(&self, variant: LadderVariant) -> &PresetLadder<ImagePreset> {
        match variant {
            LadderVariant::Standard => Self::standard_ladder(),
            LadderVariant::AutoResize => Self::auto_resize_ladder(),
        }
    }

    fn effective_profile(&self, source: &AssetProfile, params: &ImageParams) -> AssetProfile {
        let (width, height) = params.resize.apply(source.width, source.height);
        AssetProfile::still(width, height)
    }

    fn sample_window(
        &self,
        _source: &AssetProfile,
        _params: &ImageParams,
        _config: &OptimizerConfig,
    ) -> Result<SampleWindow, CalibrationError> {
        Ok(SampleWindow::still())
    }

    fn heuristic(
        &self,
        profile: &AssetProfile,
        params: &ImageParams,
        preset: &ImagePreset,
    ) -> HeuristicEstimate {
        let header = params.format.header_bytes();
        if !profile.has_dimensions() {
            return HeuristicEstimate::minimal(header);
        }
        let (width, height) = scale_dimensions(
            profile.width,
            profile.height,
            percent_scale(preset.scale_percent),
        );
        let bits = width as f64 * height as f64 * params.format.bits_per_pixel(preset.quality);
        HeuristicEstimate::from_formula(bits / 8.0, header)
    }

    fn build_settings(
        &self,
        source: &AssetProfile,
        params: &ImageParams,
        preset: &ImagePreset,
    ) -> ImageSettings {
        let (width, height) = params.resize.apply(source.width, source.height);
        let (width, height) = scale_dimensions(width, height, percent_scale(preset.scale_percent));
        let dimensions = if width > 0 && (width, height) != (source.width, source.height) {
            Some((width, height))
        } else {
            None
        };
        ImageSettings {
            format: params.format,
            quality: preset.quality,
            dimensions,
        }
    }

    fn describe(&self, preset: &ImagePreset) -> String {
        if preset.scale_percent < 100 {
            format!("Q{} @{}%", preset.quality, preset.scale_percent)
        } else {
            format!("Q{}", preset.quality)
        }
    }

    fn resolution_scale(&self, preset: &ImagePreset) -> f64 {
        percent_scale(preset.scale_percent)
    }
}
