//! Video adapter
//!
//! Ladder CRF values are on the H.264/H.265 0-51 scale; VP9 and AV1 settings
//! map them onto 0-63. Each preset also carries the audio bitrate used when
//! the source has an audio stream.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::resize::{scale_dimensions, UserResize};
use super::{percent_scale, MediaAdapter, MediaKind, BUILTIN_REFERENCE_INDEX, FACTOR_TABLE_VERSION};
use crate::asset::{AssetProfile, TimeEdit};
use crate::calibration::SampleWindow;
use crate::config::OptimizerConfig;
use crate::errors::CalibrationError;
use crate::heuristic::HeuristicEstimate;
use crate::ladder::{LadderVariant, PresetCandidate, PresetLadder};

/// A video sample never covers more than this share of the kept range.
pub const VIDEO_SAMPLE_MAX_FRACTION: f64 = 0.5;

/// Frame rate assumed when the probe could not read one.
pub const DEFAULT_VIDEO_FPS: f64 = 30.0;

/// x264 CRF 23 at this many bits per pixel is the curve's anchor.
const BASE_BITS_PER_PIXEL: f64 = 0.1;

/// Container overhead: a fixed part plus a share of the payload.
const CONTAINER_FIXED_BYTES: u64 = 4096;
const CONTAINER_OVERHEAD_RATIO: f64 = 0.015;

// ═══════════════════════════════════════════════════════════════
// Codec family
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    H265,
    Vp9,
    Av1,
}

impl VideoCodec {
    pub fn encoder(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::H265 => "libx265",
            VideoCodec::Vp9 => "libvpx-vp9",
            VideoCodec::Av1 => "libaom-av1",
        }
    }

    pub fn audio_encoder(&self) -> &'static str {
        match self {
            VideoCodec::Vp9 => "libopus",
            _ => "aac",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VideoCodec::Vp9 => "webm",
            _ => "mp4",
        }
    }

    /// Highest CRF the encoder accepts.
    pub fn crf_max(&self) -> u32 {
        match self {
            VideoCodec::H264 | VideoCodec::H265 => 51,
            VideoCodec::Vp9 | VideoCodec::Av1 => 63,
        }
    }

    /// Maps a ladder CRF (0-51) onto this encoder's scale.
    pub fn map_crf(&self, crf: u32) -> u32 {
        let crf = crf.min(51);
        match self {
            VideoCodec::H264 | VideoCodec::H265 => crf,
            VideoCodec::Vp9 | VideoCodec::Av1 => {
                ((crf as f64 * 63.0 / 51.0).round() as u32).min(self.crf_max())
            }
        }
    }

    /// Size relative to H.264 at equal CRF.
    pub fn efficiency(&self) -> f64 {
        match self {
            VideoCodec::H264 => 1.0,
            VideoCodec::H265 => 0.6,
            VideoCodec::Vp9 => 0.65,
            VideoCodec::Av1 => 0.5,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VideoCodec::H264 => "h264",
            VideoCodec::H265 => "h265",
            VideoCodec::Vp9 => "vp9",
            VideoCodec::Av1 => "av1",
        })
    }
}

impl FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h264" | "h.264" | "avc" | "x264" => Ok(VideoCodec::H264),
            "h265" | "h.265" | "hevc" | "x265" => Ok(VideoCodec::H265),
            "vp9" | "webm" => Ok(VideoCodec::Vp9),
            "av1" => Ok(VideoCodec::Av1),
            other => Err(format!("unsupported video codec '{}'", other)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Presets
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoPreset {
    pub crf: u32,
    pub scale_percent: u32,
    pub audio_kbps: u32,
}

// (crf, scale %, audio kbps, relative size factor)
type VideoRow = (u32, u32, u32, f64);

const STANDARD_TABLE: &[VideoRow] = &[
    (18, 100, 192, 1.00),
    (20, 100, 192, 0.78),
    (22, 100, 160, 0.62),
    (23, 100, 160, 0.53),
    (24, 100, 128, 0.45),
    (25, 100, 128, 0.39),
    (26, 100, 128, 0.33),
    (27, 100, 96, 0.28),
    (28, 100, 96, 0.24), // reference
    (29, 100, 96, 0.21),
    (30, 100, 64, 0.18),
    (32, 100, 64, 0.14),
    (34, 100, 48, 0.11),
    (36, 100, 48, 0.08),
    (38, 100, 32, 0.06),
    (42, 100, 32, 0.04),
];

const AUTO_RESIZE_TABLE: &[VideoRow] = &[
    (18, 100, 192, 1.00),
    (20, 100, 192, 0.78),
    (22, 100, 160, 0.62),
    (23, 100, 160, 0.53),
    (24, 100, 128, 0.45),
    (25, 100, 128, 0.39),
    (26, 100, 128, 0.33),
    (27, 100, 96, 0.28),
    (28, 100, 96, 0.24), // reference
    (29, 100, 96, 0.21),
    (30, 100, 64, 0.18),
    (30, 90, 64, 0.15),
    (30, 80, 64, 0.12),
    (30, 70, 64, 0.09),
    (30, 60, 64, 0.07),
    (32, 60, 64, 0.05),
    (34, 60, 48, 0.04),
    (36, 60, 48, 0.03),
    (38, 60, 32, 0.022),
    (42, 60, 32, 0.015),
];

fn build_ladder(name: &str, variant: LadderVariant, table: &[VideoRow]) -> PresetLadder<VideoPreset> {
    let candidates = table
        .iter()
        .map(|&(crf, scale_percent, audio_kbps, factor)| {
            PresetCandidate::new(
                VideoPreset {
                    crf,
                    scale_percent,
                    audio_kbps,
                },
                factor,
            )
        })
        .collect();
    PresetLadder::unchecked(name, variant, BUILTIN_REFERENCE_INDEX, candidates)
        .with_table_version(FACTOR_TABLE_VERSION)
}

lazy_static! {
    static ref STANDARD_LADDER: PresetLadder<VideoPreset> =
        build_ladder("video/standard", LadderVariant::Standard, STANDARD_TABLE);
    static ref AUTO_RESIZE_LADDER: PresetLadder<VideoPreset> =
        build_ladder("video/auto_resize", LadderVariant::AutoResize, AUTO_RESIZE_TABLE);
}

// ═══════════════════════════════════════════════════════════════
// Params / Settings
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoParams {
    pub codec: VideoCodec,
    pub time_edit: TimeEdit,
    pub resize: UserResize,
}

impl VideoParams {
    pub fn new(codec: VideoCodec) -> Self {
        Self {
            codec,
            ..Self::default()
        }
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    pub codec: VideoCodec,
    /// CRF on the encoder's own scale.
    pub crf: u32,
    /// `None` drops the audio stream.
    pub audio_kbps: Option<u32>,
    pub dimensions: Option<(u32, u32)>,
    pub time_edit: TimeEdit,
}

// ═══════════════════════════════════════════════════════════════
// Adapter
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default)]
pub struct VideoAdapter;

impl VideoAdapter {
    pub fn standard_ladder() -> &'static PresetLadder<VideoPreset> {
        &STANDARD_LADDER
    }

    pub fn auto_resize_ladder() -> &'static PresetLadder<VideoPreset> {
        &AUTO_RESIZE_LADDER
    }
}

/// Bits per pixel at a ladder CRF: doubles every 6 CRF steps below 23.
fn bits_per_pixel(crf: u32, codec: VideoCodec) -> f64 {
    let crf = crf.min(51) as f64;
    BASE_BITS_PER_PIXEL * 2f64.powf((23.0 - crf) / 6.0) * codec.efficiency()
}

impl MediaAdapter for VideoAdapter {
    type Params = VideoParams;
    type Preset = VideoPreset;
    type Settings = VideoSettings;

    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn ladder(&self, variant: LadderVariant) -> &PresetLadder<VideoPreset> {
        match variant {
            LadderVariant::Standard => Self::standard_ladder(),
            LadderVariant::AutoResize => Self::auto_resize_ladder(),
        }
    }

    fn effective_profile(&self, source: &AssetProfile, params: &VideoParams) -> AssetProfile {
        let (width, height) = params.resize.apply(source.width, source.height);
        AssetProfile {
            width,
            height,
            ..params.time_edit.apply(source)
        }
    }

    /// Window centred in the kept range; the middle of a clip is more
    /// representative than its (often static) opening.
    fn sample_window(
        &self,
        source: &AssetProfile,
        params: &VideoParams,
        config: &OptimizerConfig,
    ) -> Result<SampleWindow, CalibrationError> {
        SampleWindow::centered(
            params.time_edit.source_offset(source.duration_secs),
            params.time_edit.source_span(source.duration_secs),
            config.sample_seconds_for(MediaKind::Video),
            VIDEO_SAMPLE_MAX_FRACTION,
            config.min_sample_seconds,
        )
    }

    fn heuristic(
        &self,
        profile: &AssetProfile,
        params: &VideoParams,
        preset: &VideoPreset,
    ) -> HeuristicEstimate {
        if !profile.has_duration() || !profile.has_dimensions() {
            return HeuristicEstimate::minimal(CONTAINER_FIXED_BYTES);
        }
        let (width, height) = scale_dimensions(
            profile.width,
            profile.height,
            percent_scale(preset.scale_percent),
        );
        let fps = if profile.frame_rate > 0.0 {
            profile.frame_rate
        } else {
            DEFAULT_VIDEO_FPS
        };

        let video_bits = width as f64
            * height as f64
            * fps
            * profile.duration_secs
            * bits_per_pixel(preset.crf, params.codec);
        let audio_bytes = if profile.has_audio {
            preset.audio_kbps as f64 * 1000.0 / 8.0 * profile.duration_secs
        } else {
            0.0
        };
        let payload = video_bits / 8.0 + audio_bytes;
        HeuristicEstimate::from_formula(
            payload * (1.0 + CONTAINER_OVERHEAD_RATIO),
            CONTAINER_FIXED_BYTES,
        )
    }

    fn build_settings(
        &self,
        source: &AssetProfile,
        params: &VideoParams,
        preset: &VideoPreset,
    ) -> VideoSettings {
        let (width, height) = params.resize.apply(source.width, source.height);
        let (width, height) = scale_dimensions(width, height, percent_scale(preset.scale_percent));
        let dimensions = if width > 0 && (width, height) != (source.width, source.height) {
            Some((width, height))
        } else {
            None
        };
        let audio_kbps = (source.has_audio && preset.audio_kbps > 0).then_some(preset.audio_kbps);
        VideoSettings {
            codec: params.codec,
            crf: params.codec.map_crf(preset.crf),
            audio_kbps,
            dimensions,
            time_edit: params.time_edit,
        }
    }

    fn describe(&self, preset: &VideoPreset) -> String {
        if preset.scale_percent < 100 {
            format!("CRF{} @{}%", preset.crf, preset.scale_percent)
        } else {
            format!("CRF{}", preset.crf)
        }
    }

    fn resolution_scale(&self, preset: &VideoPreset) -> f64 {
        percent_scale(preset.scale_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::Confidence;

    fn clip() -> AssetProfile {
        AssetProfile::new(20.0, 1280, 720, 25.0)
    }

    #[test]
    fn test_builtin_ladders_valid() {
        for variant in [LadderVariant::Standard, LadderVariant::AutoResize] {
            let ladder = VideoAdapter.ladder(variant);
            ladder.validate().unwrap();
            assert_eq!(ladder.reference().unwrap().preset.crf, 28);
        }
        assert_eq!(VideoAdapter::standard_ladder().len(), 16);
        assert_eq!(VideoAdapter::auto_resize_ladder().len(), 20);
    }

    #[test]
    fn test_crf_mapping() {
        assert_eq!(VideoCodec::H264.map_crf(28), 28);
        assert_eq!(VideoCodec::Vp9.map_crf(51), 63);
        assert_eq!(VideoCodec::Av1.map_crf(28), 35);
        assert_eq!(VideoCodec::H265.map_crf(80), 51);
    }

    #[test]
    fn test_codec_parse() {
        assert_eq!("HEVC".parse::<VideoCodec>(), Ok(VideoCodec::H265));
        assert_eq!("h.264".parse::<VideoCodec>(), Ok(VideoCodec::H264));
        assert!("mpeg2".parse::<VideoCodec>().is_err());
        assert_eq!(VideoCodec::Vp9.extension(), "webm");
    }

    #[test]
    fn test_heuristic_anchor() {
        // CRF 23, H.264, no audio: 0.1 bpp
        let profile = AssetProfile::new(1.0, 100, 100, 10.0);
        let preset = VideoPreset {
            crf: 23,
            scale_percent: 100,
            audio_kbps: 128,
        };
        let estimate = VideoAdapter.heuristic(&profile, &VideoParams::default(), &preset);
        // 100×100×10×0.1/8 = 1250 bytes, +1.5%, +4096
        assert_eq!(estimate.bytes(), 1269 + 4096);
    }

    #[test]
    fn test_audio_only_counted_when_present() {
        let preset = VideoAdapter::standard_ladder().reference().unwrap().preset;
        let params = VideoParams::default();
        let silent = VideoAdapter.heuristic(&clip(), &params, &preset);
        let with_audio = VideoAdapter.heuristic(&clip().with_audio(true), &params, &preset);
        // 96 kbps × 20 s = 240 000 bytes, plus overhead share
        let diff = with_audio.bytes() - silent.bytes();
        assert!((243_000..=243_700).contains(&diff), "diff = {}", diff);
    }

    #[test]
    fn test_unknown_frame_rate_defaults() {
        let preset = VideoAdapter::standard_ladder().reference().unwrap().preset;
        let params = VideoParams::default();
        let unknown = AssetProfile::new(20.0, 1280, 720, 0.0);
        let thirty = AssetProfile::new(20.0, 1280, 720, 30.0);
        assert_eq!(
            VideoAdapter.heuristic(&unknown, &params, &preset),
            VideoAdapter.heuristic(&thirty, &params, &preset)
        );
    }

    #[test]
    fn test_heuristic_degenerate() {
        let preset = VideoAdapter::standard_ladder().candidates()[0].preset;
        let estimate = VideoAdapter.heuristic(&AssetProfile::unknown(), &VideoParams::default(), &preset);
        assert_eq!(estimate.bytes(), 4096);
        assert_eq!(estimate.confidence, Confidence::Minimal);
    }

    #[test]
    fn test_efficient_codecs_estimate_smaller() {
        let preset = VideoAdapter::standard_ladder().reference().unwrap().preset;
        let h264 = VideoAdapter.heuristic(&clip(), &VideoParams::new(VideoCodec::H264), &preset);
        let av1 = VideoAdapter.heuristic(&clip(), &VideoParams::new(VideoCodec::Av1), &preset);
        assert!(av1.bytes() < h264.bytes());
    }

    #[test]
    fn test_sample_window_centered() {
        let config = OptimizerConfig::default();
        let window = VideoAdapter
            .sample_window(&clip(), &VideoParams::default(), &config)
            .unwrap();
        assert_eq!(window.start_secs, 9.0);
        assert_eq!(window.duration_secs, 2.0);
        assert_eq!(window.extrapolation_ratio(), 10.0);

        // 1 s clip: half of it
        let short = AssetProfile::new(1.0, 1280, 720, 25.0);
        let window = VideoAdapter
            .sample_window(&short, &VideoParams::default(), &config)
            .unwrap();
        assert_eq!(window.duration_secs, 0.5);
        assert_eq!(window.start_secs, 0.25);
    }

    #[test]
    fn test_build_settings_audio_and_crf() {
        let preset = VideoPreset {
            crf: 28,
            scale_percent: 80,
            audio_kbps: 96,
        };
        let params = VideoParams::new(VideoCodec::Vp9);
        let silent = VideoAdapter.build_settings(&clip(), &params, &preset);
        assert_eq!(silent.audio_kbps, None);
        assert_eq!(silent.crf, 35);
        assert_eq!(silent.dimensions, Some((1024, 576)));

        let loud = VideoAdapter.build_settings(&clip().with_audio(true), &params, &preset);
        assert_eq!(loud.audio_kbps, Some(96));
        assert_eq!(VideoAdapter.describe(&preset), "CRF28 @80%");
    }
}
