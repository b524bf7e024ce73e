//! fit-size - pick encoding presets that fit a target file size
//!
//! The optimizer lives in `size_utils`; this crate adds the ffmpeg-backed
//! sample encoder and the per-file jobs the CLI runs.
//!
//! ```rust,ignore
//! use fit_size::FfmpegSampler;
//! use size_utils::{FfprobeProbe, FileSize, GifParams, NoStatus, SizeOptimizer};
//! use std::path::Path;
//!
//! let probe = FfprobeProbe::new()?;
//! let sampler = FfmpegSampler::new()?;
//! let result = SizeOptimizer::gif(&probe, &sampler).find_optimal_parameters(
//!     Path::new("clip.mp4"),
//!     &GifParams::new(),
//!     FileSize::from_mb(5),
//!     true,
//!     &NoStatus,
//! )?;
//! println!("{} -> {}", result.descriptor, result.estimated.display());
//! ```

pub mod job;
pub mod sampler;

pub use job::{
    collect_inputs, estimate_file, ladder_tables, optimize_file, resolve_kind, EstimateReport,
    EstimateRow, JobContext, JobOptions, JobReport,
};
pub use sampler::FfmpegSampler;
