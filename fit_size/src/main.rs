use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use fit_size::{
    collect_inputs, estimate_file, ladder_tables, optimize_file, EstimateReport, FfmpegSampler,
    JobContext, JobOptions, JobReport,
};
use size_utils::logging::{init_logging, LogConfig};
use size_utils::{
    CancelFlag, FfprobeProbe, FileSize, ImageFormat, MediaKind, OptimizerConfig, OptimizerError,
    TimeEdit, UserResize, VideoCodec,
};

#[derive(Parser)]
#[command(name = "fit-size")]
#[command(version, about = "Pick image/video/GIF encoding presets that fit a target file size", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Choose the best preset under a size budget for each input
    Optimize {
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,
        /// Size budget in megabytes (1 MB = 1048576 bytes)
        #[arg(short, long)]
        target_mb: f64,
        #[arg(short, long)]
        recursive: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        media: MediaArgs,
    },

    /// Show the predicted size of every preset
    Estimate {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        /// Skip the calibration encode
        #[arg(long)]
        heuristic: bool,
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        media: MediaArgs,
    },

    /// Print the built-in preset ladders as JSON
    Ladders {
        #[arg(long, value_enum, default_value_t = KindArg::Auto)]
        kind: KindArg,
    },
}

#[derive(Args, Debug, Clone)]
struct MediaArgs {
    #[arg(long, value_enum, default_value_t = KindArg::Auto)]
    kind: KindArg,
    /// Allow presets that reduce resolution
    #[arg(long)]
    auto_resize: bool,
    /// Image output format: jpeg, webp, png
    #[arg(long, default_value = "jpeg")]
    format: ImageFormat,
    /// Video codec: h264, h265, vp9, av1
    #[arg(long, default_value = "h264")]
    codec: VideoCodec,
    /// Own resize before preset scaling: 50%, 640 (width), L720 (longer edge)
    #[arg(long, default_value = "original")]
    resize: UserResize,
    /// Trim start as a fraction of the duration
    #[arg(long, default_value_t = 0.0)]
    trim_start: f64,
    /// Trim end as a fraction of the duration
    #[arg(long, default_value_t = 1.0)]
    trim_end: f64,
    /// Playback speed multiplier
    #[arg(long, default_value_t = 1.0)]
    speed: f64,
    /// Optimizer config (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Calibration sample length in seconds
    #[arg(long)]
    sample_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Auto,
    Image,
    Video,
    Gif,
}

impl KindArg {
    fn media_kind(self) -> Option<MediaKind> {
        match self {
            KindArg::Auto => None,
            KindArg::Image => Some(MediaKind::Image),
            KindArg::Video => Some(MediaKind::Video),
            KindArg::Gif => Some(MediaKind::Gif),
        }
    }
}

impl MediaArgs {
    fn job_options(&self) -> Result<JobOptions> {
        let mut config = match &self.config {
            Some(path) => OptimizerConfig::from_json_file(path)?,
            None => OptimizerConfig::default(),
        };
        if let Some(seconds) = self.sample_seconds {
            config = config.with_sample_seconds(seconds);
        }
        Ok(JobOptions {
            kind: self.kind.media_kind(),
            auto_resize: self.auto_resize,
            image_format: self.format,
            video_codec: self.codec,
            resize: self.resize,
            time_edit: TimeEdit::trimmed(self.trim_start, self.trim_end).with_speed(self.speed),
            config,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::default().with_stderr_level(if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    });
    if let Err(e) = init_logging("fit-size", log_config) {
        eprintln!("⚠️  Could not initialize logging: {}", e);
    }

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel()).context("Failed to install Ctrl-C handler")?;
    }

    match cli.command {
        Commands::Optimize {
            inputs,
            target_mb,
            recursive,
            json,
            media,
        } => {
            if !(target_mb.is_finite() && target_mb > 0.0) {
                anyhow::bail!("--target-mb must be a positive number");
            }
            let target = FileSize::from_mb_f64(target_mb);
            let options = media.job_options()?;
            let files = collect_inputs(&inputs, recursive)?;
            if files.is_empty() {
                anyhow::bail!("No media files found in the given inputs");
            }
            info!(files = files.len(), target = target.bytes(), "Starting batch");

            let probe = find_probe();
            let sampler = find_sampler();
            let ctx = JobContext {
                probe: &probe,
                encoder: &sampler,
                cancel: cancel.clone(),
            };
            let results = run_batch(&files, target, &options, &ctx, json);

            if json {
                let reports: Vec<serde_json::Value> = results
                    .iter()
                    .map(|(path, result)| match result {
                        Ok(report) => serde_json::to_value(report),
                        Err(e) => Ok(serde_json::json!({
                            "path": path,
                            "error": format!("{:#}", e),
                        })),
                    })
                    .collect::<std::result::Result<_, _>>()?;
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                print_batch_human(&results, target);
            }

            if cancel.is_cancelled() {
                eprintln!("{}", style("Cancelled").yellow());
                std::process::exit(130);
            }
            if results.iter().any(|(_, r)| r.is_err()) {
                std::process::exit(1);
            }
        }

        Commands::Estimate {
            input,
            heuristic,
            json,
            media,
        } => {
            let options = media.job_options()?;
            let probe = find_probe();
            let sampler = find_sampler();
            let ctx = JobContext {
                probe: &probe,
                encoder: &sampler,
                cancel: cancel.clone(),
            };
            let report = estimate_file(&input, &options, &ctx, heuristic)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_estimate_human(&report);
            }
        }

        Commands::Ladders { kind } => {
            let kinds: Vec<MediaKind> = match kind.media_kind() {
                Some(kind) => vec![kind],
                None => MediaKind::ALL.to_vec(),
            };
            println!("{}", serde_json::to_string_pretty(&ladder_tables(&kinds)?)?);
        }
    }

    Ok(())
}

/// ffprobe missing is not fatal: probes fail and every file falls back to
/// the heuristic.
fn find_probe() -> FfprobeProbe {
    FfprobeProbe::new().unwrap_or_else(|e| {
        warn!(error = %e, "ffprobe unavailable");
        eprintln!(
            "{} ffprobe not found, estimates will be heuristic only",
            style("⚠️").yellow()
        );
        FfprobeProbe::with_binary("ffprobe")
    })
}

fn find_sampler() -> FfmpegSampler {
    FfmpegSampler::new().unwrap_or_else(|e| {
        warn!(error = %e, "ffmpeg unavailable");
        eprintln!(
            "{} ffmpeg not found, estimates will be heuristic only",
            style("⚠️").yellow()
        );
        FfmpegSampler::with_binary("ffmpeg")
    })
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .to_string()
}

/// Optimizes every file in parallel, one spinner per file in flight.
fn run_batch(
    files: &[PathBuf],
    target: FileSize,
    options: &JobOptions,
    ctx: &JobContext<'_, FfmpegSampler>,
    quiet: bool,
) -> Vec<(PathBuf, Result<JobReport>)> {
    let multi = if quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };

    files
        .par_iter()
        .map(|path| {
            if ctx.cancel.is_cancelled() {
                return (path.clone(), Err(OptimizerError::Cancelled.into()));
            }
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(spinner_style());
            pb.set_prefix(file_label(path));
            pb.enable_steady_tick(Duration::from_millis(120));

            let sink = |message: &str| pb.set_message(message.to_string());
            let result = optimize_file(path, target, options, ctx, &sink);
            pb.finish_and_clear();
            (path.clone(), result)
        })
        .collect()
}

fn print_batch_human(results: &[(PathBuf, Result<JobReport>)], target: FileSize) {
    let mut fit = 0usize;
    let mut over = 0usize;
    let mut failed = 0usize;

    for (path, result) in results {
        match result {
            Ok(report) if report.target_exceeded => {
                over += 1;
                println!(
                    "{} {} → preset[{}] {}, est. {} still exceeds {} [{}]",
                    style("⚠️").yellow(),
                    file_label(path),
                    report.index,
                    report.descriptor,
                    style(report.estimated.display()).yellow(),
                    target.display(),
                    report.method
                );
            }
            Ok(report) => {
                fit += 1;
                println!(
                    "{} {} → preset[{}] {}, est. {} ({:.1}% of {}) [{}]",
                    style("✅").green(),
                    file_label(path),
                    report.index,
                    report.descriptor,
                    style(report.estimated.display()).green(),
                    report.budget_utilization,
                    target.display(),
                    report.method
                );
            }
            Err(e) => {
                failed += 1;
                println!("{} {}: {:#}", style("❌").red(), file_label(path), e);
            }
        }
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "📊 {} files: {} fit, {} over budget, {} failed",
        results.len(),
        style(fit).green(),
        style(over).yellow(),
        style(failed).red()
    );
}

fn print_estimate_human(report: &EstimateReport) {
    println!("\n📊 Preset size estimates ({})", report.ladder);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📁 File: {}", report.path.display());
    println!("🎯 Method: {}", report.method);
    if let Some(reason) = &report.fallback_reason {
        println!("⚠️  Calibration unavailable: {}", reason);
    }
    println!();
    for row in &report.rows {
        let marker = if row.reference { " ◀ reference" } else { "" };
        println!(
            "  [{:>2}] {:<36} ×{:<6.3} {:>10}{}",
            row.index,
            row.descriptor,
            row.relative_factor,
            row.estimated.display(),
            style(marker).cyan()
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
