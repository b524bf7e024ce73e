//! Calibrated (Sampled) Estimator
//!
//! One short real encode at the ladder's reference preset, then every other
//! preset is extrapolated through the factor table:
//!
//! ```text
//! estimate[i] = measured_size × factor[i] / factor[reference]
//! ```
//!
//! Encoding each preset separately costs one transcoder run per rung; this
//! costs exactly one, at the price of extrapolation error. When the sample
//! cannot be produced (encoder error, timeout, empty output, unreadable or
//! too-short asset) the whole ladder is estimated by the heuristic instead and
//! the result is tagged `EstimateMethod::Heuristic`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::asset::AssetProfile;
use crate::config::OptimizerConfig;
use crate::errors::{CalibrationError, SampleError};
use crate::heuristic::{self, Confidence};
use crate::ladder::{LadderVariant, PresetLadder};
use crate::media::MediaAdapter;
use crate::types::FileSize;

// ═══════════════════════════════════════════════════════════════
// Sample-encode primitive
// ═══════════════════════════════════════════════════════════════

/// Source-time range to encode. A zero-length window means "the whole still".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleWindow {
    pub start_secs: f64,
    pub duration_secs: f64,
    /// Source span the sample stands for; the sample's bytes are scaled by
    /// `covers_secs / duration_secs`.
    pub covers_secs: f64,
}

impl SampleWindow {
    pub fn still() -> Self {
        Self {
            start_secs: 0.0,
            duration_secs: 0.0,
            covers_secs: 0.0,
        }
    }

    pub fn is_still(&self) -> bool {
        self.duration_secs <= 0.0
    }

    /// Window at the start of `[offset, offset + span)`, at most
    /// `max_fraction` of the span long.
    pub fn leading(
        offset: f64,
        span: f64,
        requested: f64,
        max_fraction: f64,
        min_seconds: f64,
    ) -> Result<Self, CalibrationError> {
        let length = Self::length(span, requested, max_fraction, min_seconds)?;
        Ok(Self {
            start_secs: offset.max(0.0),
            duration_secs: length,
            covers_secs: span,
        })
    }

    /// Window centred in `[offset, offset + span)`.
    pub fn centered(
        offset: f64,
        span: f64,
        requested: f64,
        max_fraction: f64,
        min_seconds: f64,
    ) -> Result<Self, CalibrationError> {
        let length = Self::length(span, requested, max_fraction, min_seconds)?;
        Ok(Self {
            start_secs: offset.max(0.0) + (span - length) / 2.0,
            duration_secs: length,
            covers_secs: span,
        })
    }

    fn length(
        span: f64,
        requested: f64,
        max_fraction: f64,
        min_seconds: f64,
    ) -> Result<f64, CalibrationError> {
        let span = if span.is_finite() { span.max(0.0) } else { 0.0 };
        let length = requested.min(span * max_fraction);
        if !length.is_finite() || length < min_seconds {
            return Err(CalibrationError::AssetTooShort {
                available: length.max(0.0),
                required: min_seconds,
            });
        }
        Ok(length)
    }

    /// Multiplier from sample bytes to full-length bytes.
    pub fn extrapolation_ratio(&self) -> f64 {
        if self.is_still() || self.covers_secs <= 0.0 {
            1.0
        } else {
            self.covers_secs / self.duration_secs
        }
    }
}

/// Everything the primitive needs for one sample encode.
#[derive(Debug, Clone, Copy)]
pub struct SampleRequest<'a, S> {
    pub asset: &'a Path,
    pub settings: &'a S,
    pub window: SampleWindow,
    pub timeout: Duration,
}

/// Encodes a short sample and returns its size in bytes. Implementations own
/// process spawning, flag building and the timeout.
pub trait SampleEncoder<S> {
    fn encode_sample(&self, request: &SampleRequest<'_, S>) -> Result<u64, SampleError>;
}

impl<S, F> SampleEncoder<S> for F
where
    F: Fn(&SampleRequest<'_, S>) -> Result<u64, SampleError>,
{
    fn encode_sample(&self, request: &SampleRequest<'_, S>) -> Result<u64, SampleError> {
        self(request)
    }
}

// ═══════════════════════════════════════════════════════════════
// Results
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateMethod {
    Calibrated,
    Heuristic,
}

impl EstimateMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateMethod::Calibrated => "calibrated",
            EstimateMethod::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for EstimateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Full-length size of the reference preset; the basis of extrapolation.
    pub measured_size: FileSize,
    /// Raw bytes of the sample encode (zero on the heuristic path).
    pub sample_bytes: FileSize,
    pub window: Option<SampleWindow>,
    pub elapsed: Duration,
    pub method: EstimateMethod,
    pub confidence: Confidence,
    /// Why calibration was abandoned, if it was.
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresetSizeEstimate {
    pub index: usize,
    pub relative_factor: f64,
    pub estimated: FileSize,
}

/// Per-preset predictions for a whole ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderEstimate {
    pub ladder: String,
    pub variant: LadderVariant,
    pub reference_index: usize,
    pub estimates: Vec<PresetSizeEstimate>,
    pub calibration: CalibrationResult,
}

impl LadderEstimate {
    pub fn sizes(&self) -> Vec<u64> {
        self.estimates.iter().map(|e| e.estimated.bytes()).collect()
    }

    pub fn method(&self) -> EstimateMethod {
        self.calibration.method
    }
}

// ═══════════════════════════════════════════════════════════════
// Extrapolation
// ═══════════════════════════════════════════════════════════════

/// Scales a measured reference size to every rung.
/// The reference rung always equals `measured` exactly.
pub fn extrapolate<P>(ladder: &PresetLadder<P>, measured: FileSize) -> Vec<PresetSizeEstimate> {
    let reference = ladder.reference_index();
    (0..ladder.len())
        .filter_map(|index| {
            let relative_factor = ladder.relative_factor(index)?;
            let estimated = if index == reference {
                measured
            } else {
                measured.scale(relative_factor)
            };
            Some(PresetSizeEstimate {
                index,
                relative_factor,
                estimated,
            })
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════
// Calibration
// ═══════════════════════════════════════════════════════════════

/// Inputs shared by the calibrated and heuristic paths.
pub struct CalibrationInput<'a, A: MediaAdapter> {
    pub adapter: &'a A,
    pub encoder: &'a dyn SampleEncoder<A::Settings>,
    pub asset: &'a Path,
    /// Source profile as probed; `None` when probing failed.
    pub source: Option<&'a AssetProfile>,
    pub params: &'a A::Params,
    pub ladder: &'a PresetLadder<A::Preset>,
    pub config: &'a OptimizerConfig,
}

/// Performs the single reference encode.
pub fn calibrate<A: MediaAdapter>(
    input: &CalibrationInput<'_, A>,
) -> Result<CalibrationResult, CalibrationError> {
    let source = input.source.ok_or_else(|| {
        CalibrationError::UnreadableAsset(input.asset.display().to_string())
    })?;
    let reference = input.ladder.reference().ok_or_else(|| {
        CalibrationError::UnreadableAsset(format!("ladder '{}' has no reference", input.ladder.name()))
    })?;

    let window = input
        .adapter
        .sample_window(source, input.params, input.config)?;
    let settings = input
        .adapter
        .build_settings(source, input.params, &reference.preset);
    let request = SampleRequest {
        asset: input.asset,
        settings: &settings,
        window,
        timeout: input.config.timeout_for(input.adapter.kind()),
    };

    debug!(
        asset = %input.asset.display(),
        ladder = input.ladder.name(),
        reference = input.ladder.reference_index(),
        start = window.start_secs,
        seconds = window.duration_secs,
        "Encoding calibration sample"
    );

    let start = Instant::now();
    let sample_bytes = input.encoder.encode_sample(&request)?;
    let elapsed = start.elapsed();

    if sample_bytes == 0 {
        return Err(CalibrationError::ZeroBytes);
    }

    let sample_bytes = FileSize::new(sample_bytes);
    let measured_size = sample_bytes.scale(window.extrapolation_ratio());

    info!(
        asset = %input.asset.display(),
        sample_bytes = sample_bytes.bytes(),
        measured_size = measured_size.bytes(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Calibration sample measured"
    );

    Ok(CalibrationResult {
        measured_size,
        sample_bytes,
        window: Some(window),
        elapsed,
        method: EstimateMethod::Calibrated,
        confidence: Confidence::High,
        fallback_reason: None,
    })
}

/// Estimates a whole ladder: calibrated when possible, heuristic otherwise.
/// Encoder problems never escape as errors.
pub fn estimate_ladder<A: MediaAdapter>(input: &CalibrationInput<'_, A>) -> LadderEstimate {
    let started = Instant::now();
    let ladder = input.ladder;

    let (estimates, calibration) = match calibrate(input) {
        Ok(calibration) => (extrapolate(ladder, calibration.measured_size), calibration),
        Err(err) => {
            warn!(
                asset = %input.asset.display(),
                reason = err.kind(),
                error = %err,
                "Calibration failed, using heuristic estimation"
            );
            heuristic_ladder(input, started, Some(err.to_string()))
        }
    };

    LadderEstimate {
        ladder: ladder.name().to_string(),
        variant: ladder.variant(),
        reference_index: ladder.reference_index(),
        estimates,
        calibration,
    }
}

/// Heuristic-only estimate of a whole ladder (instant preview).
pub fn estimate_ladder_heuristic<A: MediaAdapter>(input: &CalibrationInput<'_, A>) -> LadderEstimate {
    let ladder = input.ladder;
    let (estimates, calibration) = heuristic_ladder(input, Instant::now(), None);
    LadderEstimate {
        ladder: ladder.name().to_string(),
        variant: ladder.variant(),
        reference_index: ladder.reference_index(),
        estimates,
        calibration,
    }
}

fn heuristic_ladder<A: MediaAdapter>(
    input: &CalibrationInput<'_, A>,
    started: Instant,
    fallback_reason: Option<String>,
) -> (Vec<PresetSizeEstimate>, CalibrationResult) {
    let ladder = input.ladder;
    let source = input.source.copied().unwrap_or_default();
    let profile = input.adapter.effective_profile(&source, input.params);
    let heuristics = heuristic::estimate_ladder(input.adapter, &profile, input.params, ladder);

    let estimates: Vec<PresetSizeEstimate> = heuristics
        .iter()
        .enumerate()
        .map(|(index, h)| PresetSizeEstimate {
            index,
            relative_factor: ladder.relative_factor(index).unwrap_or(1.0),
            estimated: h.estimated,
        })
        .collect();

    let measured_size = estimates
        .get(ladder.reference_index())
        .map(|e| e.estimated)
        .unwrap_or_default();

    let calibration = CalibrationResult {
        measured_size,
        sample_bytes: FileSize::ZERO,
        window: None,
        elapsed: started.elapsed(),
        method: EstimateMethod::Heuristic,
        confidence: heuristic::overall_confidence(&heuristics),
        fallback_reason,
    };
    (estimates, calibration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::PresetCandidate;

    fn three_rung() -> PresetLadder<u8> {
        PresetLadder::new(
            "test/standard",
            LadderVariant::Standard,
            1,
            vec![
                PresetCandidate::new(0, 1.5),
                PresetCandidate::new(1, 1.0),
                PresetCandidate::new(2, 0.4),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_extrapolate_scenario() {
        let estimates = extrapolate(&three_rung(), FileSize::new(2_000_000));
        let sizes: Vec<u64> = estimates.iter().map(|e| e.estimated.bytes()).collect();
        assert_eq!(sizes, vec![3_000_000, 2_000_000, 800_000]);
        assert_eq!(estimates[1].relative_factor, 1.0);
    }

    #[test]
    fn test_extrapolate_reference_identity_odd_sizes() {
        let ladder = PresetLadder::new(
            "odd",
            LadderVariant::Standard,
            1,
            vec![PresetCandidate::new(0, 0.77), PresetCandidate::new(1, 0.41)],
        )
        .unwrap();
        let measured = FileSize::new(1_234_567);
        assert_eq!(extrapolate(&ladder, measured)[1].estimated, measured);
    }

    #[test]
    fn test_leading_window() {
        let window = SampleWindow::leading(2.0, 10.0, 1.5, 0.8, 0.3).unwrap();
        assert_eq!(window.start_secs, 2.0);
        assert_eq!(window.duration_secs, 1.5);
        assert!((window.extrapolation_ratio() - 10.0 / 1.5).abs() < 1e-12);

        // short clip: capped at 80%
        let window = SampleWindow::leading(0.0, 1.0, 1.5, 0.8, 0.3).unwrap();
        assert!((window.duration_secs - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_centered_window() {
        let window = SampleWindow::centered(0.0, 10.0, 2.0, 0.5, 0.3).unwrap();
        assert_eq!(window.start_secs, 4.0);
        assert_eq!(window.duration_secs, 2.0);
        assert_eq!(window.extrapolation_ratio(), 5.0);
    }

    #[test]
    fn test_window_too_short() {
        let err = SampleWindow::leading(0.0, 0.2, 1.5, 0.8, 0.3).unwrap_err();
        assert!(matches!(err, CalibrationError::AssetTooShort { .. }));
        assert!(SampleWindow::centered(0.0, 0.0, 2.0, 0.5, 0.3).is_err());
        assert!(SampleWindow::centered(0.0, f64::NAN, 2.0, 0.5, 0.3).is_err());
    }

    #[test]
    fn test_still_window() {
        let window = SampleWindow::still();
        assert!(window.is_still());
        assert_eq!(window.extrapolation_ratio(), 1.0);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::ladder::PresetCandidate;
    use proptest::prelude::*;

    proptest! {
        /// The reference rung reproduces the measured size exactly, and the
        /// extrapolated sizes keep the ladder's descending order.
        #[test]
        fn prop_extrapolation_reference_identity(
            measured in 1u64..(1u64 << 40),
            mut factors in proptest::collection::vec(0.01f64..5.0, 1..24),
            reference_seed in any::<usize>(),
        ) {
            factors.sort_by(|a, b| b.partial_cmp(a).unwrap());
            let reference = reference_seed % factors.len();
            let ladder = PresetLadder::new(
                "prop",
                LadderVariant::Standard,
                reference,
                factors.iter().enumerate().map(|(i, f)| PresetCandidate::new(i, *f)).collect(),
            ).unwrap();

            let estimates = extrapolate(&ladder, FileSize::new(measured));
            prop_assert_eq!(estimates.len(), factors.len());
            prop_assert_eq!(estimates[reference].estimated.bytes(), measured);
            for pair in estimates.windows(2) {
                prop_assert!(pair[0].estimated >= pair[1].estimated);
            }
        }
    }
}
