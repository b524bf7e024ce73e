//! FFmpeg sample encoder
//!
//! Implements `SampleEncoder` for the three media families by encoding the
//! requested window into a temp file and reporting its size. The temp file is
//! removed when the encode returns, success or not.
//!
//! Command layout:
//!
//! ```text
//! ffmpeg -y -hide_banner -nostdin -loglevel error [-ss S -t D] -i INPUT <media args> OUTPUT
//! ```
//!
//! `-ss`/`-t` go before `-i` so the window is measured in source time, which
//! is what `SampleWindow` carries; retiming is applied by the filters.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use size_utils::calibration::{SampleEncoder, SampleRequest, SampleWindow};
use size_utils::errors::SampleError;
use size_utils::ffmpeg_process::FfmpegProcess;
use size_utils::{GifSettings, ImageFormat, ImageSettings, VideoCodec, VideoSettings};

/// Runs sample encodes with a real ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegSampler {
    binary: PathBuf,
    scratch_dir: Option<PathBuf>,
}

impl FfmpegSampler {
    /// Locates `ffmpeg` on `PATH`.
    pub fn new() -> Result<Self, SampleError> {
        let binary = which::which("ffmpeg").map_err(|_| {
            SampleError::Spawn("ffmpeg not found. Install with: brew install ffmpeg".to_string())
        })?;
        Ok(Self::with_binary(binary))
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            scratch_dir: None,
        }
    }

    /// Directory for sample outputs; defaults to the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn encode(
        &self,
        asset: &Path,
        window: &SampleWindow,
        media_args: Vec<String>,
        extension: &str,
        timeout: std::time::Duration,
    ) -> Result<u64, SampleError> {
        let suffix = format!(".{}", extension);
        let mut builder = tempfile::Builder::new();
        builder.prefix("fit-size-sample-").suffix(&suffix);
        let output = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let mut cmd = Command::new(&self.binary);
        cmd.args(["-y", "-hide_banner", "-nostdin", "-loglevel", "error"])
            .args(window_args(window))
            .arg("-i")
            .arg(safe_path_arg(asset))
            .args(&media_args)
            .arg(safe_path_arg(output.path()));

        FfmpegProcess::spawn(&mut cmd)?.wait_success(timeout)?;

        let bytes = std::fs::metadata(output.path())
            .map_err(|_| SampleError::MissingOutput)?
            .len();
        debug!(
            asset = %asset.display(),
            start = window.start_secs,
            seconds = window.duration_secs,
            bytes,
            "Sample encoded"
        );
        Ok(bytes)
    }
}

impl SampleEncoder<GifSettings> for FfmpegSampler {
    fn encode_sample(&self, request: &SampleRequest<'_, GifSettings>) -> Result<u64, SampleError> {
        self.encode(
            request.asset,
            &request.window,
            gif_args(request.settings),
            "gif",
            request.timeout,
        )
    }
}

impl SampleEncoder<ImageSettings> for FfmpegSampler {
    fn encode_sample(
        &self,
        request: &SampleRequest<'_, ImageSettings>,
    ) -> Result<u64, SampleError> {
        self.encode(
            request.asset,
            &request.window,
            image_args(request.settings),
            request.settings.format.extension(),
            request.timeout,
        )
    }
}

impl SampleEncoder<VideoSettings> for FfmpegSampler {
    fn encode_sample(
        &self,
        request: &SampleRequest<'_, VideoSettings>,
    ) -> Result<u64, SampleError> {
        self.encode(
            request.asset,
            &request.window,
            video_args(request.settings),
            request.settings.codec.extension(),
            request.timeout,
        )
    }
}

// ═══════════════════════════════════════════════════════════════
// Argument builders
// ═══════════════════════════════════════════════════════════════

/// Prefixes relative paths starting with `-` so ffmpeg does not read them
/// as options.
fn safe_path_arg(path: &Path) -> OsString {
    if path.as_os_str().to_string_lossy().starts_with('-') {
        let mut prefixed = OsString::from("./");
        prefixed.push(path.as_os_str());
        prefixed
    } else {
        path.as_os_str().to_os_string()
    }
}

fn window_args(window: &SampleWindow) -> Vec<String> {
    if window.is_still() {
        return Vec::new();
    }
    vec![
        "-ss".to_string(),
        format!("{:.3}", window.start_secs),
        "-t".to_string(),
        format!("{:.3}", window.duration_secs),
    ]
}

fn scale_filter(dimensions: Option<(u32, u32)>) -> Option<String> {
    dimensions.map(|(w, h)| format!("scale={}:{}:flags=lanczos", w, h))
}

fn setpts_filter(speed: f64) -> Option<String> {
    if (speed - 1.0).abs() < 1e-9 {
        None
    } else {
        Some(format!("setpts=PTS/{}", speed))
    }
}

/// `atempo` accepts 0.5..=2.0 per instance, so larger changes are chained.
fn atempo_filter(speed: f64) -> Option<String> {
    if (speed - 1.0).abs() < 1e-9 {
        return None;
    }
    let mut remaining = speed;
    let mut stages = Vec::new();
    while remaining > 2.0 {
        stages.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        stages.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    stages.push(format!("atempo={}", remaining));
    Some(stages.join(","))
}

/// Single-pass palette GIF: the palette is generated from the same filtered
/// frames it is applied to.
pub fn gif_args(settings: &GifSettings) -> Vec<String> {
    let mut chain: Vec<String> = Vec::new();
    chain.extend(setpts_filter(settings.time_edit.playback_speed()));
    chain.push(format!("fps={}", settings.fps));
    chain.extend(scale_filter(settings.dimensions));
    let filter = format!(
        "{},split[s0][s1];[s0]palettegen=max_colors={}[p];[s1][p]paletteuse={}",
        chain.join(","),
        settings.colors.clamp(2, 256),
        settings.dither.paletteuse_options()
    );
    vec!["-vf".to_string(), filter, "-an".to_string()]
}

pub fn image_args(settings: &ImageSettings) -> Vec<String> {
    let codec = match settings.format {
        ImageFormat::Jpeg => "mjpeg",
        ImageFormat::Webp => "libwebp",
        ImageFormat::Png => "png",
    };
    let mut args = vec!["-frames:v".to_string(), "1".to_string()];
    if let Some(scale) = scale_filter(settings.dimensions) {
        args.push("-vf".to_string());
        args.push(scale);
    }
    args.push("-c:v".to_string());
    args.push(codec.to_string());
    args.extend(settings.quality_args());
    args
}

pub fn video_args(settings: &VideoSettings) -> Vec<String> {
    let speed = settings.time_edit.playback_speed();
    let codec = settings.codec;

    let mut chain: Vec<String> = Vec::new();
    chain.extend(setpts_filter(speed));
    chain.extend(scale_filter(settings.dimensions));

    let mut args = vec![
        "-c:v".to_string(),
        codec.encoder().to_string(),
        "-crf".to_string(),
        settings.crf.to_string(),
    ];
    match codec {
        VideoCodec::H264 | VideoCodec::H265 => {
            args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
        }
        // constant-quality mode needs an explicit zero bitrate
        VideoCodec::Vp9 => args.extend(["-b:v".to_string(), "0".to_string()]),
        VideoCodec::Av1 => args.extend([
            "-b:v".to_string(),
            "0".to_string(),
            "-cpu-used".to_string(),
            "8".to_string(),
        ]),
    }
    if !chain.is_empty() {
        args.push("-vf".to_string());
        args.push(chain.join(","));
    }

    match settings.audio_kbps {
        Some(kbps) => {
            args.extend([
                "-c:a".to_string(),
                codec.audio_encoder().to_string(),
                "-b:a".to_string(),
                format!("{}k", kbps),
            ]);
            if let Some(atempo) = atempo_filter(speed) {
                args.push("-af".to_string());
                args.push(atempo);
            }
        }
        None => args.push("-an".to_string()),
    }
    args
}
