//! Target-size estimation for image, video and GIF encodes
//!
//! Given an asset, a byte budget and a ladder of presets, pick the
//! highest-quality preset predicted to fit, using one short calibration
//! encode instead of encoding every candidate:
//! - `ladder`: preset ladders, ordered largest expected output first
//! - `heuristic`: closed-form estimates, no encode
//! - `calibration`: one reference sample, extrapolated through size factors
//! - `search`: first-fit linear scan over the estimates
//! - `optimizer`: the per-media entry points
//! - `media`: GIF / image / video adapters and their built-in ladders
//! - `ffprobe`, `ffmpeg_process`: probing and process plumbing for callers
//!   that drive ffmpeg
//! - `logging`, `config`, `errors`, `types`: shared infrastructure

pub mod asset;
pub mod calibration;
pub mod config;
pub mod errors;
pub mod ffmpeg_process;
pub mod ffprobe;
pub mod heuristic;
pub mod ladder;
pub mod logging;
pub mod media;
pub mod optimizer;
pub mod search;
pub mod status;
pub mod types;

mod pipeline_tests;

pub use asset::{AssetProbe, AssetProfile, TimeEdit};
pub use calibration::{
    extrapolate, CalibrationResult, EstimateMethod, LadderEstimate, PresetSizeEstimate,
    SampleEncoder, SampleRequest, SampleWindow,
};
pub use config::OptimizerConfig;
pub use errors::{CalibrationError, OptimizerError, ProbeError, SampleError};
pub use ffprobe::FfprobeProbe;
pub use heuristic::{Confidence, HeuristicEstimate};
pub use ladder::{LadderVariant, PresetCandidate, PresetLadder};
pub use logging::{init_logging, LogConfig};
pub use media::{
    GifAdapter, GifDither, GifParams, GifPreset, GifSettings, ImageAdapter, ImageFormat,
    ImageParams, ImagePreset, ImageSettings, MediaAdapter, MediaKind, UserResize, VideoAdapter,
    VideoCodec, VideoParams, VideoPreset, VideoSettings, FACTOR_TABLE_VERSION,
};
pub use optimizer::{
    GifOptimizer, ImageOptimizer, OptimizationResult, SizeOptimizer, VideoOptimizer,
};
pub use search::{select_preset, Selection};
pub use status::{NoStatus, StatusLog, StatusSink};
pub use types::{CancelFlag, FileSize};
