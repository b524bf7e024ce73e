//! GIF adapter
//!
//! Degradation order along the ladders: dither first (cheap, barely visible),
//! then colours, then frame rate. The auto-resize ladder inserts resolution
//! steps before the low-colour/low-fps tail and keeps the tail at 60%.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::resize::{scale_dimensions, UserResize};
use super::{percent_scale, MediaAdapter, MediaKind, BUILTIN_REFERENCE_INDEX, FACTOR_TABLE_VERSION};
use crate::asset::{AssetProfile, TimeEdit};
use crate::calibration::SampleWindow;
use crate::config::OptimizerConfig;
use crate::errors::CalibrationError;
use crate::heuristic::HeuristicEstimate;
use crate::ladder::{LadderVariant, PresetCandidate, PresetLadder};

/// A GIF sample never covers more than this share of the kept range.
pub const GIF_SAMPLE_MAX_FRACTION: f64 = 0.8;

/// LZW gain from unchanged regions between frames (moderate motion).
const INTER_FRAME_FACTOR: f64 = 0.75;

// ═══════════════════════════════════════════════════════════════
// Presets
// ═══════════════════════════════════════════════════════════════

/// Palette dithering, from none to error diffusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GifDither {
    None,
    Bayer { scale: u8 },
    FloydSteinberg,
}

impl GifDither {
    /// Ladder dither level: 0 none, 1..=4 bayer (scale 5, 4, 3, 1),
    /// 5 and above floyd_steinberg.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => GifDither::None,
            1 => GifDither::Bayer { scale: 5 },
            2 => GifDither::Bayer { scale: 4 },
            3 => GifDither::Bayer { scale: 3 },
            4 => GifDither::Bayer { scale: 1 },
            _ => GifDither::FloydSteinberg,
        }
    }

    /// Options for ffmpeg's `paletteuse` filter.
    pub fn paletteuse_options(&self) -> String {
        match self {
            GifDither::None => "dither=none".to_string(),
            GifDither::Bayer { scale } => format!("dither=bayer:bayer_scale={}", scale),
            GifDither::FloydSteinberg => "dither=floyd_steinberg".to_string(),
        }
    }
}

impl fmt::Display for GifDither {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GifDither::None => f.write_str("none"),
            GifDither::Bayer { scale } => write!(f, "bayer:{}", scale),
            GifDither::FloydSteinberg => f.write_str("floyd_steinberg"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GifPreset {
    /// 0..=5, see [`GifDither::from_level`].
    pub dither_level: u8,
    pub fps: u32,
    pub colors: u32,
    pub scale_percent: u32,
}

impl GifPreset {
    pub fn dither(&self) -> GifDither {
        GifDither::from_level(self.dither_level)
    }
}

// (dither, fps, colors, scale %, relative size factor)
type GifRow = (u8, u32, u32, u32, f64);

const STANDARD_TABLE: &[GifRow] = &[
    (5, 24, 256, 100, 1.00),
    (4, 24, 256, 100, 1.00),
    (3, 24, 256, 100, 0.85),
    (3, 24, 192, 100, 0.77),
    (3, 24, 128, 100, 0.66),
    (3, 20, 128, 100, 0.55),
    (2, 20, 128, 100, 0.45),
    (2, 18, 128, 100, 0.43),
    (2, 15, 128, 100, 0.41), // reference
    (2, 15, 96, 100, 0.36),
    (2, 15, 64, 100, 0.32),
    (2, 12, 64, 100, 0.26),
    (1, 12, 64, 100, 0.23),
    (1, 12, 48, 100, 0.20),
    (1, 10, 32, 100, 0.14),
    (1, 8, 32, 100, 0.11),
    (0, 8, 16, 100, 0.08),
    (0, 6, 16, 100, 0.06),
];

const AUTO_RESIZE_TABLE: &[GifRow] = &[
    (5, 24, 256, 100, 1.00),
    (4, 24, 256, 100, 1.00),
    (3, 24, 256, 100, 0.85),
    (3, 24, 192, 100, 0.77),
    (3, 24, 128, 100, 0.66),
    (3, 20, 128, 100, 0.55),
    (2, 20, 128, 100, 0.45),
    (2, 18, 128, 100, 0.43),
    (2, 15, 128, 100, 0.41), // reference
    (2, 15, 96, 100, 0.36),
    (2, 15, 64, 100, 0.32),
    (2, 12, 64, 100, 0.26),
    // resolution steps
    (2, 15, 64, 90, 0.21),
    (2, 15, 64, 80, 0.17),
    (2, 15, 64, 70, 0.13),
    (2, 12, 64, 60, 0.10),
    // low-quality tail at 60%
    (1, 12, 48, 60, 0.075),
    (1, 10, 32, 60, 0.05),
    (1, 8, 32, 60, 0.04),
    (0, 8, 16, 60, 0.03),
    (0, 6, 16, 60, 0.02),
];

fn build_ladder(name: &str, variant: LadderVariant, table: &[GifRow]) -> PresetLadder<GifPreset> {
    let candidates = table
        .iter()
        .map(|&(dither_level, fps, colors, scale_percent, factor)| {
            PresetCandidate::new(
                GifPreset {
                    dither_level,
                    fps,
                    colors,
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
    static ref STANDARD_LADDER: PresetLadder<GifPreset> =
        build_ladder("gif/standard", LadderVariant::Standard, STANDARD_TABLE);
    static ref AUTO_RESIZE_LADDER: PresetLadder<GifPreset> =
        build_ladder("gif/auto_resize", LadderVariant::AutoResize, AUTO_RESIZE_TABLE);
}

// ═══════════════════════════════════════════════════════════════
// Params / Settings
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GifParams {
    pub time_edit: TimeEdit,
    pub resize: UserResize,
}

impl GifParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_edit(mut self, time_edit: TimeEdit) -> Self {
        self.time_edit = time_edit;
        self
    }

    pub fn with_resize(mut self, resize: UserResize) -> Self {
        self.resize = resize;
        self
    }
}

/// Concrete settings for the GIF encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GifSettings {
    pub fps: u32,
    pub colors: u32,
    pub dither: GifDither,
    /// Output size when it differs from the source.
    pub dimensions: Option<(u32, u32)>,
    pub time_edit: TimeEdit,
}

// ═══════════════════════════════════════════════════════════════
// Adapter
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default)]
pub struct GifAdapter;

impl GifAdapter {
    pub fn standard_ladder() -> &'static PresetLadder<GifPreset> {
        &STANDARD_LADDER
    }

    pub fn auto_resize_ladder() -> &'static PresetLadder<GifPreset> {
        &AUTO_RESIZE_LADDER
    }
}

impl MediaAdapter for GifAdapter {
    type Params = GifParams;
    type Preset = GifPreset;
    type Settings = GifSettings;

    fn kind(&self) -> MediaKind {
        MediaKind::Gif
    }

    fn ladder(&self, variant: LadderVariant) -> &PresetLadder<GifPreset> {
        match variant {
            LadderVariant::Standard => Self::standard_ladder(),
            LadderVariant::AutoResize => Self::auto_resize_ladder(),
        }
    }

    fn effective_profile(&self, source: &AssetProfile, params: &GifParams) -> AssetProfile {
        let (width, height) = params.resize.apply(source.width, source.height);
        AssetProfile {
            width,
            height,
            ..params.time_edit.apply(source)
        }
    }

    /// Window at the start of the kept range.
    fn sample_window(
        &self,
        source: &AssetProfile,
        params: &GifParams,
        config: &OptimizerConfig,
    ) -> Result<SampleWindow, CalibrationError> {
        SampleWindow::leading(
            params.time_edit.source_offset(source.duration_secs),
            params.time_edit.source_span(source.duration_secs),
            config.sample_seconds_for(MediaKind::Gif),
            GIF_SAMPLE_MAX_FRACTION,
            config.min_sample_seconds,
        )
    }

    /// frames × pixels × palette density × dither cost × inter-frame gain,
    /// plus header and global palette.
    fn heuristic(
        &self,
        profile: &AssetProfile,
        _params: &GifParams,
        preset: &GifPreset,
    ) -> HeuristicEstimate {
        let colors = preset.colors.clamp(2, 256);
        let header = 800 + colors as u64 * 3;
        if !profile.has_duration() || !profile.has_dimensions() || preset.fps == 0 {
            return HeuristicEstimate::minimal(header);
        }

        let (width, height) = scale_dimensions(
            profile.width,
            profile.height,
            percent_scale(preset.scale_percent),
        );
        // the fps filter only duplicates frames above the source rate
        let fps = if profile.frame_rate > 0.0 {
            (preset.fps as f64).min(profile.frame_rate)
        } else {
            preset.fps as f64
        };
        let frames = (profile.duration_secs * fps).floor().max(1.0);
        let color_factor = 0.3 + colors as f64 / 256.0 * 0.4;
        let dither_factor = 0.8 + 0.04 * preset.dither_level.min(5) as f64;

        let payload = width as f64
            * height as f64
            * color_factor
            * dither_factor
            * frames
            * INTER_FRAME_FACTOR;
        HeuristicEstimate::from_formula(payload, header)
    }

    fn build_settings(
        &self,
        source: &AssetProfile,
        params: &GifParams,
        preset: &GifPreset,
    ) -> GifSettings {
        let (width, height) = params.resize.apply(source.width, source.height);
        let (width, height) = scale_dimensions(width, height, percent_scale(preset.scale_percent));
        let dimensions = if width > 0 && (width, height) != (source.width, source.height) {
            Some((width, height))
        } else {
            None
        };
        GifSettings {
            fps: preset.fps,
            colors: preset.colors,
            dither: preset.dither(),
            dimensions,
            time_edit: params.time_edit,
        }
    }

    fn describe(&self, preset: &GifPreset) -> String {
        let mut label = format!(
            "{}fps, {} colors, {}",
            preset.fps,
            preset.colors,
            preset.dither()
        );
        if preset.scale_percent < 100 {
            label.push_str(&format!(", {}% res", preset.scale_percent));
        }
        label
    }

    fn resolution_scale(&self, preset: &GifPreset) -> f64 {
        percent_scale(preset.scale_percent)
    }
}
