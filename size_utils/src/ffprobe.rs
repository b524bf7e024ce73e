//! FFprobe asset probing
//!
//! Reads duration, display dimensions, frame rate and audio presence with a
//! single `ffprobe -show_format -show_streams` call. JSON is parsed with serde
//! into lenient structs: every field is optional and missing values become
//! "unknown" (zero) in the resulting `AssetProfile`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

use crate::asset::{AssetProbe, AssetProfile};
use crate::errors::ProbeError;

const FALLBACK_FRAME_RATE: f64 = 24.0;

// ============================================================================
// JSON model
// ============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: FfprobeFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FfprobeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FfprobeTags {
    #[serde(default)]
    rotate: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FfprobeSideData {
    #[serde(default)]
    rotation: Option<f64>,
}

impl FfprobeStream {
    fn is(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }

    /// Rotation in degrees from the `rotate` tag or display-matrix side data.
    fn rotation(&self) -> i64 {
        let tagged = self
            .tags
            .rotate
            .as_deref()
            .and_then(|r| r.trim().parse::<f64>().ok());
        let side = self.side_data_list.iter().find_map(|d| d.rotation);
        tagged.or(side).map(|r| r.round() as i64).unwrap_or(0)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// `"30000/1001"`, `"25/1"` or `"29.97"`; falls back to 24 fps.
pub fn parse_frame_rate(s: &str) -> f64 {
    if s.contains('/') {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() == 2 {
            let num = parts[0].parse::<f64>().unwrap_or(0.0);
            let den = parts[1].parse::<f64>().unwrap_or(0.0);
            if den > 0.0 {
                let rate = num / den;
                if rate > 0.0 {
                    return rate;
                }
            }
        }
    }
    match s.parse::<f64>() {
        Ok(v) if v > 0.0 && v.is_finite() => v,
        _ => {
            if !s.is_empty() && s != "0" && s != "0/1" && s != "0/0" {
                warn!(value = s, fallback = FALLBACK_FRAME_RATE, "Failed to parse frame rate");
            }
            FALLBACK_FRAME_RATE
        }
    }
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Builds a profile from ffprobe's JSON output.
pub fn parse_probe_output(json: &str) -> Result<AssetProfile, ProbeError> {
    let parsed: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| ProbeError::Parse(e.to_string()))?;

    let video = parsed.streams.iter().find(|s| s.is("video"));
    let has_audio = parsed.streams.iter().any(|s| s.is("audio"));

    let duration = parse_seconds(parsed.format.duration.as_deref())
        .or_else(|| video.and_then(|v| parse_seconds(v.duration.as_deref())))
        .unwrap_or(0.0);

    let Some(video) = video else {
        return Err(ProbeError::Parse("No video stream found".to_string()));
    };

    let mut width = video.width.unwrap_or(0);
    let mut height = video.height.unwrap_or(0);
    if video.rotation().rem_euclid(180) == 90 {
        std::mem::swap(&mut width, &mut height);
    }

    let frame_rate = match video
        .r_frame_rate
        .as_deref()
        .or(video.avg_frame_rate.as_deref())
    {
        Some(rate) => parse_frame_rate(rate),
        None => 0.0,
    };

    Ok(AssetProfile::new(duration, width, height, frame_rate).with_audio(has_audio))
}

// ============================================================================
// FfprobeProbe
// ============================================================================

#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl FfprobeProbe {
    /// Locates `ffprobe` on `PATH`.
    pub fn new() -> Result<Self, ProbeError> {
        let binary = which::which("ffprobe").map_err(|_| {
            ProbeError::ToolNotFound(
                "ffprobe not found. Install with: brew install ffmpeg".to_string(),
            )
        })?;
        Ok(Self { binary })
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl AssetProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> Result<AssetProfile, ProbeError> {
        if !path.is_file() {
            return Err(ProbeError::ExecutionFailed(format!(
                "Not a file: {}",
                path.display()
            )));
        }

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg("--")
            .arg(path)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!(
                    "ffprobe failed to analyze file: {} (exit code: {:?})",
                    path.display(),
                    output.status.code()
                )
            } else {
                format!("ffprobe error for '{}': {}", path.display(), stderr.trim())
            };
            return Err(ProbeError::ExecutionFailed(message));
        }

        let profile = parse_probe_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!(
            path = %path.display(),
            duration = profile.duration_secs,
            width = profile.width,
            height = profile.height,
            fps = profile.frame_rate,
            audio = profile.has_audio,
            "Probed asset"
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        let cases: &[(&str, f64, f64)] = &[
            ("30/1", 30.0, 0.001),
            ("25/1", 25.0, 0.001),
            ("30000/1001", 30000.0 / 1001.0, 0.0001),
            ("24000/1001", 24000.0 / 1001.0, 0.0001),
            ("24", 24.0, 0.001),
            ("29.97", 29.97, 0.01),
            ("120/1", 120.0, 0.001),
        ];

        for (input, expected, tolerance) in cases {
            let result = parse_frame_rate(input);
            assert!(
                (result - expected).abs() < *tolerance,
                "parse_frame_rate({:?}): expected {}, got {}",
                input,
                expected,
                result
            );
        }
    }

    #[test]
    fn test_parse_frame_rate_edge_cases() {
        assert_eq!(parse_frame_rate("30/0"), FALLBACK_FRAME_RATE);
        assert_eq!(parse_frame_rate("invalid"), FALLBACK_FRAME_RATE);
        assert_eq!(parse_frame_rate(""), FALLBACK_FRAME_RATE);
        assert_eq!(parse_frame_rate("30/1/extra"), FALLBACK_FRAME_RATE);
    }

    #[test]
    fn test_parse_video_with_audio() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30000/1001"},
                {"codec_type": "audio", "sample_rate": "48000"}
            ],
            "format": {"duration": "12.500000", "format_name": "mov,mp4"}
        }"#;
        let profile = parse_probe_output(json).unwrap();
        assert_eq!(profile.duration_secs, 12.5);
        assert_eq!((profile.width, profile.height), (1920, 1080));
        assert!((profile.frame_rate - 29.97).abs() < 0.01);
        assert!(profile.has_audio);
    }

    #[test]
    fn test_parse_rotated_phone_clip() {
        let tagged = r#"{
            "streams": [{"codec_type": "video", "width": 1920, "height": 1080,
                         "r_frame_rate": "30/1", "tags": {"rotate": "90"}}],
            "format": {"duration": "3.0"}
        }"#;
        let profile = parse_probe_output(tagged).unwrap();
        assert_eq!((profile.width, profile.height), (1080, 1920));

        let matrix = r#"{
            "streams": [{"codec_type": "video", "width": 1920, "height": 1080,
                         "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]}],
            "format": {}
        }"#;
        let profile = parse_probe_output(matrix).unwrap();
        assert_eq!((profile.width, profile.height), (1080, 1920));
        assert_eq!(profile.duration_secs, 0.0);
        assert_eq!(profile.frame_rate, 0.0);
    }

    #[test]
    fn test_parse_still_image() {
        let json = r#"{
            "streams": [{"codec_type": "video", "codec_name": "png", "width": 800, "height": 600,
                         "r_frame_rate": "25/1"}],
            "format": {"format_name": "png_pipe"}
        }"#;
        let profile = parse_probe_output(json).unwrap();
        assert_eq!(profile.duration_secs, 0.0);
        assert_eq!(profile.pixels(), 480_000);
        assert!(!profile.has_audio);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_probe_output("not json"), Err(ProbeError::Parse(_))));
        assert!(matches!(
            parse_probe_output(r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#),
            Err(ProbeError::Parse(_))
        ));
    }

    #[test]
    fn test_probe_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FfprobeProbe::with_binary("ffprobe");
        assert!(matches!(
            probe.probe(dir.path()),
            Err(ProbeError::ExecutionFailed(_))
        ));
    }
}
