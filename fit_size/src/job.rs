//! Per-file jobs behind the CLI
//!
//! Resolves the media kind of each input, builds the matching optimizer and
//! flattens its generic result into a serializable report.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use size_utils::calibration::{EstimateMethod, LadderEstimate, SampleEncoder};
use size_utils::{
    AssetProbe, CancelFlag, FileSize, GifParams, ImageFormat, ImageParams, LadderVariant,
    MediaAdapter, MediaKind, OptimizerConfig, PresetLadder, SizeOptimizer, StatusSink, TimeEdit,
    UserResize, VideoCodec, VideoParams,
};

/// Everything a job needs besides the file itself.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// `None` guesses from the extension.
    pub kind: Option<MediaKind>,
    pub auto_resize: bool,
    pub image_format: ImageFormat,
    pub video_codec: VideoCodec,
    pub resize: UserResize,
    pub time_edit: TimeEdit,
    pub config: OptimizerConfig,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            kind: None,
            auto_resize: false,
            image_format: ImageFormat::default(),
            video_codec: VideoCodec::default(),
            resize: UserResize::default(),
            time_edit: TimeEdit::default(),
            config: OptimizerConfig::default(),
        }
    }
}

impl JobOptions {
    fn gif_params(&self) -> GifParams {
        GifParams::new()
            .with_time_edit(self.time_edit)
            .with_resize(self.resize)
    }

    fn image_params(&self) -> ImageParams {
        ImageParams::new(self.image_format).with_resize(self.resize)
    }

    fn video_params(&self) -> VideoParams {
        VideoParams::new(self.video_codec)
            .with_time_edit(self.time_edit)
            .with_resize(self.resize)
    }
}

/// Flattened `OptimizationResult` for one input.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub path: PathBuf,
    pub media: MediaKind,
    pub index: usize,
    pub descriptor: String,
    pub estimated: FileSize,
    pub target: FileSize,
    pub target_exceeded: bool,
    pub method: EstimateMethod,
    pub ladder: String,
    pub resolution_scale: Option<f64>,
    pub budget_utilization: f64,
    pub settings: serde_json::Value,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EstimateRow {
    pub index: usize,
    pub descriptor: String,
    pub relative_factor: f64,
    pub estimated: FileSize,
    pub reference: bool,
}

/// Every preset of the active ladder with its predicted size.
#[derive(Debug, Clone, Serialize)]
pub struct EstimateReport {
    pub path: PathBuf,
    pub media: MediaKind,
    pub ladder: String,
    pub method: EstimateMethod,
    pub fallback_reason: Option<String>,
    pub rows: Vec<EstimateRow>,
}

/// Shared collaborators for a batch.
pub struct JobContext<'a, E> {
    pub probe: &'a dyn AssetProbe,
    pub encoder: &'a E,
    pub cancel: CancelFlag,
}

// ═══════════════════════════════════════════════════════════════
// Input collection
// ═══════════════════════════════════════════════════════════════

/// Expands files and directories into media files, smallest first so quick
/// results show up early. Explicit files are kept even with an unknown
/// extension; `--kind` may still make sense of them.
pub fn collect_inputs(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let walker = if recursive {
                WalkDir::new(input).follow_links(true)
            } else {
                WalkDir::new(input).max_depth(1)
            };
            files.extend(
                walker
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| MediaKind::from_path(e.path()).is_some())
                    .map(|e| e.path().to_path_buf()),
            );
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            bail!("Input not found: {}", input.display());
        }
    }

    let mut sized: Vec<(PathBuf, u64)> = files
        .into_iter()
        .map(|path| {
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            (path, size)
        })
        .collect();
    sized.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    sized.dedup_by(|a, b| a.0 == b.0);
    Ok(sized.into_iter().map(|(path, _)| path).collect())
}

pub fn resolve_kind(path: &Path, requested: Option<MediaKind>) -> Result<MediaKind> {
    match requested {
        Some(kind) => Ok(kind),
        None => MediaKind::from_path(path).with_context(|| {
            format!(
                "Cannot tell the media kind of {}; pass --kind",
                path.display()
            )
        }),
    }
}

// ═══════════════════════════════════════════════════════════════
// Jobs
// ═══════════════════════════════════════════════════════════════

/// Runs `find_optimal_parameters` for one file.
pub fn optimize_file<E>(
    path: &Path,
    target: FileSize,
    options: &JobOptions,
    ctx: &JobContext<'_, E>,
    sink: &dyn StatusSink,
) -> Result<JobReport>
where
    E: SampleEncoder<size_utils::GifSettings>
        + SampleEncoder<size_utils::ImageSettings>
        + SampleEncoder<size_utils::VideoSettings>,
{
    match resolve_kind(path, options.kind)? {
        MediaKind::Gif => optimize_with(
            SizeOptimizer::gif(ctx.probe, ctx.encoder),
            path,
            &options.gif_params(),
            target,
            options,
            ctx,
            sink,
        ),
        MediaKind::Image => optimize_with(
            SizeOptimizer::image(ctx.probe, ctx.encoder),
            path,
            &options.image_params(),
            target,
            options,
            ctx,
            sink,
        ),
        MediaKind::Video => optimize_with(
            SizeOptimizer::video(ctx.probe, ctx.encoder),
            path,
            &options.video_params(),
            target,
            options,
            ctx,
            sink,
        ),
    }
}

fn optimize_with<A: MediaAdapter, E>(
    optimizer: SizeOptimizer<'_, A>,
    path: &Path,
    params: &A::Params,
    target: FileSize,
    options: &JobOptions,
    ctx: &JobContext<'_, E>,
    sink: &dyn StatusSink,
) -> Result<JobReport> {
    let optimizer = optimizer
        .with_config(options.config.clone())
        .with_cancel_flag(ctx.cancel.clone());
    let result = optimizer
        .find_optimal_parameters(path, params, target, options.auto_resize, sink)
        .with_context(|| format!("Optimization failed: {}", path.display()))?;

    Ok(JobReport {
        path: path.to_path_buf(),
        media: result.media,
        index: result.index,
        descriptor: result.descriptor,
        estimated: result.estimated,
        target: result.target,
        target_exceeded: result.target_exceeded,
        method: result.method,
        ladder: result.ladder,
        resolution_scale: result.resolution_scale,
        budget_utilization: result.budget_utilization,
        settings: serde_json::to_value(&result.settings)
            .context("Failed to serialize encoder settings")?,
        elapsed_ms: result.elapsed.as_millis() as u64,
    })
}

/// Predicted size of every preset for one file.
pub fn estimate_file<E>(
    path: &Path,
    options: &JobOptions,
    ctx: &JobContext<'_, E>,
    heuristic_only: bool,
) -> Result<EstimateReport>
where
    E: SampleEncoder<size_utils::GifSettings>
        + SampleEncoder<size_utils::ImageSettings>
        + SampleEncoder<size_utils::VideoSettings>,
{
    match resolve_kind(path, options.kind)? {
        MediaKind::Gif => estimate_with(
            SizeOptimizer::gif(ctx.probe, ctx.encoder),
            path,
            &options.gif_params(),
            options,
            ctx,
            heuristic_only,
        ),
        MediaKind::Image => estimate_with(
            SizeOptimizer::image(ctx.probe, ctx.encoder),
            path,
            &options.image_params(),
            options,
            ctx,
            heuristic_only,
        ),
        MediaKind::Video => estimate_with(
            SizeOptimizer::video(ctx.probe, ctx.encoder),
            path,
            &options.video_params(),
            options,
            ctx,
            heuristic_only,
        ),
    }
}

fn estimate_with<A: MediaAdapter, E>(
    optimizer: SizeOptimizer<'_, A>,
    path: &Path,
    params: &A::Params,
    options: &JobOptions,
    ctx: &JobContext<'_, E>,
    heuristic_only: bool,
) -> Result<EstimateReport> {
    let optimizer = optimizer
        .with_config(options.config.clone())
        .with_cancel_flag(ctx.cancel.clone());
    let estimate = if heuristic_only {
        optimizer.estimate_heuristic_preset_sizes(path, params, options.auto_resize)
    } else {
        optimizer.estimate_all_preset_sizes(path, params, options.auto_resize)
    }
    .with_context(|| format!("Estimation failed: {}", path.display()))?;

    let adapter = optimizer.adapter();
    let ladder = adapter.ladder(LadderVariant::from_auto_resize(options.auto_resize));
    let LadderEstimate {
        ladder: ladder_name,
        reference_index,
        estimates,
        calibration,
        ..
    } = estimate;

    let rows = estimates
        .into_iter()
        .map(|e| EstimateRow {
            index: e.index,
            descriptor: ladder
                .get(e.index)
                .map(|c| adapter.describe(&c.preset))
                .unwrap_or_default(),
            relative_factor: e.relative_factor,
            estimated: e.estimated,
            reference: e.index == reference_index,
        })
        .collect();

    Ok(EstimateReport {
        path: path.to_path_buf(),
        media: adapter.kind(),
        ladder: ladder_name,
        method: calibration.method,
        fallback_reason: calibration.fallback_reason,
        rows,
    })
}

/// Built-in ladders for the requested kinds, keyed by ladder name.
/// Fails on the first table that breaks the ladder contract.
pub fn ladder_tables(kinds: &[MediaKind]) -> Result<serde_json::Value> {
    use size_utils::{GifAdapter, ImageAdapter, VideoAdapter};

    let mut tables = serde_json::Map::new();
    for kind in kinds {
        for variant in [LadderVariant::Standard, LadderVariant::AutoResize] {
            let (name, value) = match kind {
                MediaKind::Gif => ladder_entry(GifAdapter.ladder(variant))?,
                MediaKind::Image => ladder_entry(ImageAdapter.ladder(variant))?,
                MediaKind::Video => ladder_entry(VideoAdapter.ladder(variant))?,
            };
            tables.insert(name, value);
        }
    }
    Ok(serde_json::Value::Object(tables))
}

fn ladder_entry<P: Serialize>(ladder: &PresetLadder<P>) -> Result<(String, serde_json::Value)> {
    ladder
        .validate()
        .with_context(|| format!("Built-in ladder '{}' is invalid", ladder.name()))?;
    Ok((ladder.name().to_string(), serde_json::to_value(ladder)?))
}
