//! Shared Error Types
//!
//! Two families live here:
//! - caller contract violations (`OptimizerError`), surfaced immediately
//! - encoder/probe failures (`SampleError`, `CalibrationError`, `ProbeError`),
//!   which the calibrated estimator absorbs and downgrades to the heuristic path

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors returned to callers of the optimizer entry points.
#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Target size must be greater than zero bytes")]
    InvalidTarget,

    #[error("Preset ladder '{0}' is empty")]
    EmptyLadder(String),

    #[error("Preset ladder '{ladder}': reference index {index} out of range (len {len})")]
    ReferenceOutOfRange {
        ladder: String,
        index: usize,
        len: usize,
    },

    #[error("Preset ladder '{ladder}': candidate {index} has invalid size factor {factor}")]
    InvalidFactor {
        ladder: String,
        index: usize,
        factor: f64,
    },

    #[error("Preset ladder '{ladder}': factor at {index} ({factor}) exceeds the previous candidate ({previous})")]
    NotDescending {
        ladder: String,
        index: usize,
        factor: f64,
        previous: f64,
    },

    #[error("Size estimate list is empty")]
    NoEstimates,

    #[error("Optimization cancelled")]
    Cancelled,
}

/// Failure of the caller-supplied sample-encode primitive.
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("Failed to start encoder: {0}")]
    Spawn(String),

    #[error("Encoder exited with code {exit_code:?}: {stderr}")]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Sample encode timed out after {0:?}")]
    Timeout(Duration),

    #[error("Encoder produced no output file")]
    MissingOutput,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl SampleError {
    /// Timeouts and non-zero exits may succeed on a different asset or preset;
    /// spawn failures mean the encoder is not usable at all.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SampleError::Spawn(_))
    }
}

/// Why the calibrated estimator fell back to the heuristic.
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Sample encode failed: {0}")]
    Sample(#[from] SampleError),

    #[error("Sample encode produced 0 bytes")]
    ZeroBytes,

    #[error("Asset too short to sample ({available:.2}s < {required:.2}s)")]
    AssetTooShort { available: f64, required: f64 },

    #[error("Asset metadata unavailable: {0}")]
    UnreadableAsset(String),
}

impl CalibrationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CalibrationError::Sample(SampleError::Timeout(_)))
    }

    /// Short tag used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CalibrationError::Sample(SampleError::Timeout(_)) => "timeout",
            CalibrationError::Sample(_) => "sample_failed",
            CalibrationError::ZeroBytes => "zero_bytes",
            CalibrationError::AssetTooShort { .. } => "too_short",
            CalibrationError::UnreadableAsset(_) => "unreadable_asset",
        }
    }
}

/// Asset probing failures (ffprobe).
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("FFprobe failed: {0}")]
    ExecutionFailed(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, OptimizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_error_kinds() {
        let timeout = CalibrationError::from(SampleError::Timeout(Duration::from_secs(60)));
        assert!(timeout.is_timeout());
        assert_eq!(timeout.kind(), "timeout");

        let failed = CalibrationError::from(SampleError::Failed {
            exit_code: Some(1),
            stderr: "Invalid data found when processing input".to_string(),
        });
        assert!(!failed.is_timeout());
        assert_eq!(failed.kind(), "sample_failed");

        assert_eq!(CalibrationError::ZeroBytes.kind(), "zero_bytes");
    }

    #[test]
    fn test_sample_error_recoverable() {
        assert!(!SampleError::Spawn("ffmpeg".into()).is_recoverable());
        assert!(SampleError::MissingOutput.is_recoverable());
        assert!(SampleError::Timeout(Duration::from_secs(1)).is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = OptimizerError::ReferenceOutOfRange {
            ladder: "gif/standard".into(),
            index: 9,
            len: 3,
        };
        assert_eq!(
            err.to_string(),
            "Preset ladder 'gif/standard': reference index 9 out of range (len 3)"
        );
        assert_eq!(
            OptimizerError::InvalidTarget.to_string(),
            "Target size must be greater than zero bytes"
        );
    }
}
