//! Target-Size Optimizer
//!
//! One synchronous pipeline per call:
//!
//! ```text
//! probe → active ladder → calibrated estimate (or heuristic fallback)
//!       → linear scan → OptimizationResult
//! ```
//!
//! Nothing is cached between calls; concurrent calls need one optimizer each
//! or a thread-safe encoder.

use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::asset::{AssetProbe, AssetProfile};
use crate::calibration::{
    self, CalibrationInput, CalibrationResult, EstimateMethod, LadderEstimate,
    PresetSizeEstimate, SampleEncoder,
};
use crate::config::OptimizerConfig;
use crate::errors::{OptimizerError, Result};
use crate::ladder::{LadderVariant, PresetLadder};
use crate::media::{GifAdapter, ImageAdapter, MediaAdapter, MediaKind, VideoAdapter};
use crate::search::{self, Selection};
use crate::status::{emit, StatusSink};
use crate::types::{CancelFlag, FileSize};

/// Outcome of `find_optimal_parameters`.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult<P, S> {
    pub media: MediaKind,
    pub candidate: P,
    /// Transcoder-facing settings for the selected candidate.
    pub settings: S,
    pub index: usize,
    pub estimated: FileSize,
    pub target: FileSize,
    /// Even the smallest candidate is predicted over budget.
    pub target_exceeded: bool,
    pub descriptor: String,
    pub method: EstimateMethod,
    pub variant: LadderVariant,
    pub ladder: String,
    pub table_version: String,
    /// Set when the candidate scales the resolution below 100%.
    pub resolution_scale: Option<f64>,
    /// `estimated / target × 100`.
    pub budget_utilization: f64,
    pub elapsed: Duration,
    pub calibration: CalibrationResult,
    pub estimates: Vec<PresetSizeEstimate>,
}

pub struct SizeOptimizer<'a, A: MediaAdapter> {
    adapter: A,
    probe: &'a dyn AssetProbe,
    encoder: &'a dyn SampleEncoder<A::Settings>,
    config: OptimizerConfig,
    cancel: CancelFlag,
}

pub type GifOptimizer<'a> = SizeOptimizer<'a, GifAdapter>;
pub type ImageOptimizer<'a> = SizeOptimizer<'a, ImageAdapter>;
pub type VideoOptimizer<'a> = SizeOptimizer<'a, VideoAdapter>;

impl<'a> SizeOptimizer<'a, GifAdapter> {
    pub fn gif(probe: &'a dyn AssetProbe, encoder: &'a dyn SampleEncoder<crate::media::GifSettings>) -> Self {
        Self::new(GifAdapter, probe, encoder)
    }
}

impl<'a> SizeOptimizer<'a, ImageAdapter> {
    pub fn image(
        probe: &'a dyn AssetProbe,
        encoder: &'a dyn SampleEncoder<crate::media::ImageSettings>,
    ) -> Self {
        Self::new(ImageAdapter, probe, encoder)
    }
}

impl<'a> SizeOptimizer<'a, VideoAdapter> {
    pub fn video(
        probe: &'a dyn AssetProbe,
        encoder: &'a dyn SampleEncoder<crate::media::VideoSettings>,
    ) -> Self {
        Self::new(VideoAdapter, probe, encoder)
    }
}

impl<'a, A: MediaAdapter> SizeOptimizer<'a, A> {
    pub fn new(
        adapter: A,
        probe: &'a dyn AssetProbe,
        encoder: &'a dyn SampleEncoder<A::Settings>,
    ) -> Self {
        Self {
            adapter,
            probe,
            encoder,
            config: OptimizerConfig::default(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares the caller's cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Picks the highest-quality preset predicted to fit `target`.
    pub fn find_optimal_parameters(
        &self,
        asset: &Path,
        params: &A::Params,
        target: FileSize,
        auto_resize: bool,
        sink: &dyn StatusSink,
    ) -> Result<OptimizationResult<A::Preset, A::Settings>> {
        let started = Instant::now();
        if target.is_zero() {
            return Err(OptimizerError::InvalidTarget);
        }
        let ladder = self.active_ladder(auto_resize)?;

        emit(sink, &format!("Optimizing for target size: {}...", target.display()));
        emit(
            sink,
            &format!(
                "Auto-resize: {}",
                if auto_resize { "enabled" } else { "disabled" }
            ),
        );

        self.check_cancelled()?;
        let source = self.probe_source(asset);
        let estimate = calibration::estimate_ladder(&self.calibration_input(
            asset,
            source.as_ref(),
            params,
            ladder,
        ));

        match estimate.calibration.method {
            EstimateMethod::Calibrated => emit(
                sink,
                &format!(
                    "Calibration complete in {:.1}s",
                    estimate.calibration.elapsed.as_secs_f64()
                ),
            ),
            EstimateMethod::Heuristic => {
                emit(sink, "Using heuristic estimation (calibration unavailable)")
            }
        }

        let Selection {
            index,
            estimated,
            target_exceeded,
        } = search::select_preset(&estimate.estimates, target)?;
        let candidate = ladder
            .get(index)
            .ok_or(OptimizerError::NoEstimates)?
            .preset
            .clone();

        let settings = self.adapter.build_settings(
            &source.unwrap_or_default(),
            params,
            &candidate,
        );
        let descriptor = self.adapter.describe(&candidate);
        let scale = self.adapter.resolution_scale(&candidate);
        let resolution_scale = (scale < 1.0).then_some(scale);
        let budget_utilization = estimated.utilization_of(target).unwrap_or(0.0);

        if let Some(scale) = resolution_scale {
            emit(
                sink,
                &format!("Applied resolution scale: {:.0}%", scale * 100.0),
            );
        }
        if target_exceeded {
            emit(
                sink,
                &format!(
                    "Warning: smallest preset still exceeds target ({} > {})",
                    estimated.display(),
                    target.display()
                ),
            );
        }
        emit(
            sink,
            &format!(
                "Selected preset[{}]: {}, est. {} ({:.1}% of target)",
                index,
                descriptor,
                estimated.display(),
                budget_utilization
            ),
        );

        self.check_cancelled()?;

        let elapsed = started.elapsed();
        info!(
            asset = %asset.display(),
            media = %self.adapter.kind(),
            ladder = ladder.name(),
            index,
            estimated = estimated.bytes(),
            target = target.bytes(),
            exceeded = target_exceeded,
            method = %estimate.calibration.method,
            elapsed_ms = elapsed.as_millis() as u64,
            "Optimization finished"
        );

        let LadderEstimate {
            estimates,
            calibration,
            ..
        } = estimate;

        Ok(OptimizationResult {
            media: self.adapter.kind(),
            candidate,
            settings,
            index,
            estimated,
            target,
            target_exceeded,
            descriptor,
            method: calibration.method,
            variant: ladder.variant(),
            ladder: ladder.name().to_string(),
            table_version: ladder.table_version().to_string(),
            resolution_scale,
            budget_utilization,
            elapsed,
            calibration,
            estimates,
        })
    }

    /// Preview of every preset size: one calibration encode, no scan.
    pub fn estimate_all_preset_sizes(
        &self,
        asset: &Path,
        params: &A::Params,
        auto_resize: bool,
    ) -> Result<LadderEstimate> {
        let ladder = self.active_ladder(auto_resize)?;
        self.check_cancelled()?;
        let source = self.probe_source(asset);
        let estimate =
            calibration::estimate_ladder(&self.calibration_input(asset, source.as_ref(), params, ladder));
        self.check_cancelled()?;
        Ok(estimate)
    }

    /// Instant preview from the heuristic alone; never spawns an encode.
    pub fn estimate_heuristic_preset_sizes(
        &self,
        asset: &Path,
        params: &A::Params,
        auto_resize: bool,
    ) -> Result<LadderEstimate> {
        let ladder = self.active_ladder(auto_resize)?;
        let source = self.probe_source(asset);
        Ok(calibration::estimate_ladder_heuristic(&self.calibration_input(
            asset,
            source.as_ref(),
            params,
            ladder,
        )))
    }

    fn active_ladder(&self, auto_resize: bool) -> Result<&PresetLadder<A::Preset>> {
        let ladder = self
            .adapter
            .ladder(LadderVariant::from_auto_resize(auto_resize));
        ladder.validate()?;
        Ok(ladder)
    }

    fn calibration_input<'b>(
        &'b self,
        asset: &'b Path,
        source: Option<&'b AssetProfile>,
        params: &'b A::Params,
        ladder: &'b PresetLadder<A::Preset>,
    ) -> CalibrationInput<'b, A> {
        CalibrationInput {
            adapter: &self.adapter,
            encoder: self.encoder,
            asset,
            source,
            params,
            ladder,
            config: &self.config,
        }
    }

    fn probe_source(&self, asset: &Path) -> Option<AssetProfile> {
        match self.probe.probe(asset) {
            Ok(profile) => Some(profile.sanitized()),
            Err(err) => {
                warn!(asset = %asset.display(), error = %err, "Probe failed, metadata unknown");
                None
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(OptimizerError::Cancelled)
        } else {
            Ok(())
        }
    }
}
