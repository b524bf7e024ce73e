//! End-to-end optimizer scenarios
//!
//! Probe, encoder and sink are all closures here, so nothing touches ffmpeg.

#[cfg(test)]
mod scenario_tests {
    use crate::calibration::extrapolate;
    use crate::ladder::{LadderVariant, PresetCandidate, PresetLadder};
    use crate::search::select_preset;
    use crate::types::FileSize;

    fn three_rung_ladder() -> PresetLadder<&'static str> {
        PresetLadder::new(
            "test/three",
            LadderVariant::Standard,
            1,
            vec![
                PresetCandidate::new("high", 1.5),
                PresetCandidate::new("mid", 1.0),
                PresetCandidate::new("low", 0.4),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_calibrated_estimates() {
        let estimates = extrapolate(&three_rung_ladder(), FileSize::new(2_000_000));
        let sizes: Vec<u64> = estimates.iter().map(|e| e.estimated.bytes()).collect();
        assert_eq!(sizes, vec![3_000_000, 2_000_000, 800_000]);
    }

    #[test]
    fn test_budget_between_rungs() {
        let estimates = extrapolate(&three_rung_ladder(), FileSize::new(2_000_000));
        let selection = select_preset(&estimates, FileSize::new(1_000_000)).unwrap();
        assert_eq!(selection.index, 2);
        assert_eq!(selection.estimated.bytes(), 800_000);
        assert!(!selection.target_exceeded);
    }

    #[test]
    fn test_budget_below_smallest() {
        let estimates = extrapolate(&three_rung_ladder(), FileSize::new(2_000_000));
        let selection = select_preset(&estimates, FileSize::new(500_000)).unwrap();
        assert_eq!(selection.index, 2);
        assert!(selection.target_exceeded);
    }

    #[test]
    fn test_budget_above_largest() {
        let estimates = extrapolate(&three_rung_ladder(), FileSize::new(2_000_000));
        let selection = select_preset(&estimates, FileSize::new(10_000_000)).unwrap();
        assert_eq!(selection.index, 0);
        assert!(!selection.target_exceeded);
    }

    #[test]
    fn test_exact_fit_is_inclusive() {
        let estimates = extrapolate(&three_rung_ladder(), FileSize::new(2_000_000));
        let selection = select_preset(&estimates, FileSize::new(2_000_000)).unwrap();
        assert_eq!(selection.index, 1);
    }
}

#[cfg(test)]
mod builtin_ladder_tests {
    use crate::ladder::{LadderVariant, PresetLadder};
    use crate::media::{
        GifAdapter, ImageAdapter, MediaAdapter, VideoAdapter, BUILTIN_REFERENCE_INDEX,
        FACTOR_TABLE_VERSION,
    };

    fn assert_well_formed<P>(ladder: &PresetLadder<P>) {
        ladder.validate().unwrap();
        assert_eq!(ladder.reference_index(), BUILTIN_REFERENCE_INDEX);
        assert_eq!(ladder.table_version(), FACTOR_TABLE_VERSION);
        let factors: Vec<f64> = ladder.iter().map(|c| c.relative_size_factor).collect();
        for pair in factors.windows(2) {
            assert!(pair[0] >= pair[1], "{}: {:?}", ladder.name(), factors);
        }
    }

    #[test]
    fn test_all_builtin_ladders_non_increasing() {
        for variant in [LadderVariant::Standard, LadderVariant::AutoResize] {
            assert_well_formed(GifAdapter.ladder(variant));
            assert_well_formed(ImageAdapter.ladder(variant));
            assert_well_formed(VideoAdapter.ladder(variant));
        }
    }

    #[test]
    fn test_auto_resize_extends_standard() {
        assert!(GifAdapter.ladder(LadderVariant::AutoResize).len() > GifAdapter.ladder(LadderVariant::Standard).len());
        assert!(ImageAdapter.ladder(LadderVariant::AutoResize).len() > ImageAdapter.ladder(LadderVariant::Standard).len());
        assert!(VideoAdapter.ladder(LadderVariant::AutoResize).len() > VideoAdapter.ladder(LadderVariant::Standard).len());
    }

    #[test]
    fn test_ladder_serializes_for_tooling() {
        let json = serde_json::to_value(GifAdapter.ladder(LadderVariant::Standard)).unwrap();
        assert_eq!(json["name"], "gif/standard");
        assert_eq!(json["reference_index"], 8);
        assert!(json["candidates"].as_array().unwrap().len() == 18);
        assert!(json["candidates"][0]["relative_size_factor"].is_number());
    }
}

#[cfg(test)]
mod optimizer_pipeline_tests {
    use crate::asset::{AssetProfile, TimeEdit};
    use crate::calibration::{EstimateMethod, SampleRequest};
    use crate::config::OptimizerConfig;
    use crate::errors::{OptimizerError, ProbeError, SampleError};
    use crate::media::{
        GifParams, GifSettings, MediaKind, VideoCodec, VideoParams, VideoSettings,
    };
    use crate::optimizer::SizeOptimizer;
    use crate::status::{NoStatus, StatusLog};
    use crate::types::{CancelFlag, FileSize};
    use std::cell::{Cell, RefCell};
    use std::path::Path;

    fn probe_clip(_: &Path) -> Result<AssetProfile, ProbeError> {
        Ok(AssetProfile::new(20.0, 1280, 720, 30.0).with_audio(true))
    }

    fn timeout_gif(request: &SampleRequest<'_, GifSettings>) -> Result<u64, SampleError> {
        Err(SampleError::Timeout(request.timeout))
    }

    #[test]
    fn test_reference_rung_equals_measurement() {
        let encoder = |request: &SampleRequest<'_, VideoSettings>| -> Result<u64, SampleError> {
            // 2 s centered window of a 20 s clip
            assert!((request.window.duration_secs - 2.0).abs() < 1e-9);
            assert!((request.window.start_secs - 9.0).abs() < 1e-9);
            Ok(100_000)
        };
        let optimizer = SizeOptimizer::video(&probe_clip, &encoder);
        let estimate = optimizer
            .estimate_all_preset_sizes(Path::new("clip.mp4"), &VideoParams::new(VideoCodec::H264), false)
            .unwrap();
        assert_eq!(estimate.method(), EstimateMethod::Calibrated);
        let reference = estimate.reference_index;
        // 100 KB over 2 s of a 20 s clip
        assert_eq!(estimate.estimates[reference].estimated.bytes(), 1_000_000);
        assert_eq!(estimate.calibration.measured_size.bytes(), 1_000_000);
        assert_eq!(estimate.calibration.sample_bytes.bytes(), 100_000);
    }

    #[test]
    fn test_trim_shrinks_extrapolation() {
        let encoder = |request: &SampleRequest<'_, VideoSettings>| -> Result<u64, SampleError> {
            assert!((request.window.covers_secs - 10.0).abs() < 1e-9);
            Ok(100_000)
        };
        let optimizer = SizeOptimizer::video(&probe_clip, &encoder);
        let params = VideoParams::new(VideoCodec::H264)
            .with_time_edit(TimeEdit::trimmed(0.0, 0.5).with_speed(2.0));
        let estimate = optimizer
            .estimate_all_preset_sizes(Path::new("clip.mp4"), &params, false)
            .unwrap();
        assert_eq!(estimate.calibration.measured_size.bytes(), 500_000);
    }

    #[test]
    fn test_timeout_falls_back_with_reason() {
        let optimizer = SizeOptimizer::gif(&probe_clip, &timeout_gif)
            .with_config(OptimizerConfig::default().with_timeout(MediaKind::Gif, std::time::Duration::from_secs(3)));
        let log = StatusLog::new();
        let result = optimizer
            .find_optimal_parameters(Path::new("clip.mp4"), &GifParams::new(), FileSize::from_mb(4), false, &log)
            .unwrap();
        assert_eq!(result.method, EstimateMethod::Heuristic);
        let reason = result.calibration.fallback_reason.unwrap();
        assert!(reason.contains("timed out"), "reason: {}", reason);
        assert!(log.contains("Using heuristic estimation (calibration unavailable)"));
        assert_eq!(result.estimates.len(), 18);
    }

    #[test]
    fn test_status_sequence() {
        let encoder = |_: &SampleRequest<'_, GifSettings>| -> Result<u64, SampleError> { Ok(50_000) };
        let optimizer = SizeOptimizer::gif(&probe_clip, &encoder);
        let lines = RefCell::new(Vec::new());
        let sink = |message: &str| lines.borrow_mut().push(message.to_string());
        optimizer
            .find_optimal_parameters(Path::new("clip.mp4"), &GifParams::new(), FileSize::from_mb(2), true, &sink)
            .unwrap();
        let lines = lines.into_inner();
        assert_eq!(lines[0], "Optimizing for target size: 2.00 MB...");
        assert_eq!(lines[1], "Auto-resize: enabled");
        assert!(lines[2].starts_with("Calibration complete in "));
        assert!(lines.last().unwrap().starts_with("Selected preset["));
    }

    #[test]
    fn test_gif_auto_resize_selects_scaled_rung() {
        let encoder = |_: &SampleRequest<'_, GifSettings>| -> Result<u64, SampleError> { Ok(30_000) };
        let optimizer = SizeOptimizer::gif(&probe_clip, &encoder);
        let estimate = optimizer
            .estimate_all_preset_sizes(Path::new("clip.mp4"), &GifParams::new(), true)
            .unwrap();
        assert_eq!(estimate.ladder, "gif/auto_resize");
        assert_eq!(estimate.method(), EstimateMethod::Calibrated);
        assert_eq!(estimate.estimates.len(), 21);
        let sizes = estimate.sizes();
        assert!(sizes.windows(2).all(|w| w[0] >= w[1]), "sizes: {:?}", sizes);

        // first 90% rung, strictly below the last full-resolution rung
        assert!(sizes[12] < sizes[11]);
        let log = StatusLog::new();
        let result = optimizer
            .find_optimal_parameters(
                Path::new("clip.mp4"),
                &GifParams::new(),
                FileSize::new(sizes[12]),
                true,
                &log,
            )
            .unwrap();
        assert_eq!(result.index, 12);
        assert_eq!(result.ladder, "gif/auto_resize");
        assert_eq!(result.method, EstimateMethod::Calibrated);
        assert_eq!(result.resolution_scale, Some(0.9));
        assert_eq!(result.settings.dimensions, Some((1152, 648)));
        assert!(!result.target_exceeded);
        assert!(log.contains("Auto-resize: enabled"));
        assert!(log.contains("Applied resolution scale: 90%"));
    }

    #[test]
    fn test_too_short_asset_never_encodes() {
        let probe = |_: &Path| -> Result<AssetProfile, ProbeError> {
            Ok(AssetProfile::new(0.2, 320, 240, 10.0))
        };
        let calls = Cell::new(0u32);
        let encoder = |_: &SampleRequest<'_, GifSettings>| -> Result<u64, SampleError> {
            calls.set(calls.get() + 1);
            Ok(1)
        };
        let optimizer = SizeOptimizer::gif(&probe, &encoder);
        let estimate = optimizer
            .estimate_all_preset_sizes(Path::new("blip.gif"), &GifParams::new(), false)
            .unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(estimate.method(), EstimateMethod::Heuristic);
    }

    #[test]
    fn test_cancel_from_inside_encode() {
        let cancel = CancelFlag::new();
        let encoder_flag = cancel.clone();
        let encoder = move |_: &SampleRequest<'_, GifSettings>| -> Result<u64, SampleError> {
            encoder_flag.cancel();
            Ok(10_000)
        };
        let optimizer = SizeOptimizer::gif(&probe_clip, &encoder).with_cancel_flag(cancel);
        let result = optimizer.find_optimal_parameters(
            Path::new("clip.mp4"),
            &GifParams::new(),
            FileSize::from_mb(1),
            false,
            &NoStatus,
        );
        assert!(matches!(result, Err(OptimizerError::Cancelled)));
    }

    #[test]
    fn test_result_serializes() {
        let encoder = |_: &SampleRequest<'_, VideoSettings>| -> Result<u64, SampleError> { Ok(200_000) };
        let optimizer = SizeOptimizer::video(&probe_clip, &encoder);
        let result = optimizer
            .find_optimal_parameters(
                Path::new("clip.mp4"),
                &VideoParams::new(VideoCodec::Vp9),
                FileSize::from_mb(1),
                false,
                &NoStatus,
            )
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["media"], "video");
        assert_eq!(json["method"], "calibrated");
        assert_eq!(json["ladder"], "video/standard");
        assert!(json["settings"]["crf"].as_u64().unwrap() > 0);
        assert!(json["settings"]["audio_kbps"].is_number());
    }
}

#[cfg(test)]
mod heuristic_prop_tests {
    use crate::asset::AssetProfile;
    use crate::heuristic;
    use crate::ladder::LadderVariant;
    use crate::media::{
        GifAdapter, GifParams, ImageAdapter, ImageFormat, ImageParams, MediaAdapter, VideoAdapter,
        VideoCodec, VideoParams,
    };
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Same inputs, same estimates.
        #[test]
        fn prop_heuristic_is_deterministic(
            duration in 0.0f64..600.0,
            width in 0u32..4096,
            height in 0u32..4096,
            fps in 0.0f64..120.0,
            auto_resize: bool,
        ) {
            let profile = AssetProfile::new(duration, width, height, fps);
            let variant = LadderVariant::from_auto_resize(auto_resize);

            let gif = GifParams::new();
            let first = heuristic::estimate_ladder(&GifAdapter, &profile, &gif, GifAdapter.ladder(variant));
            let second = heuristic::estimate_ladder(&GifAdapter, &profile, &gif, GifAdapter.ladder(variant));
            prop_assert_eq!(first, second);

            let image = ImageParams::new(ImageFormat::Webp);
            let first = heuristic::estimate_ladder(&ImageAdapter, &profile, &image, ImageAdapter.ladder(variant));
            let second = heuristic::estimate_ladder(&ImageAdapter, &profile, &image, ImageAdapter.ladder(variant));
            prop_assert_eq!(first, second);

            let video = VideoParams::new(VideoCodec::H265);
            let first = heuristic::estimate_ladder(&VideoAdapter, &profile, &video, VideoAdapter.ladder(variant));
            let second = heuristic::estimate_ladder(&VideoAdapter, &profile, &video, VideoAdapter.ladder(variant));
            prop_assert_eq!(first, second);
        }

        /// Heuristic estimates never go below the container overhead.
        #[test]
        fn prop_heuristic_positive(
            duration in 0.0f64..600.0,
            width in 0u32..4096,
            height in 0u32..4096,
        ) {
            let profile = AssetProfile::new(duration, width, height, 30.0);
            let estimates = heuristic::estimate_ladder(
                &VideoAdapter,
                &profile,
                &VideoParams::new(VideoCodec::H264),
                VideoAdapter.ladder(LadderVariant::AutoResize),
            );
            prop_assert!(estimates.iter().all(|e| e.bytes() > 0));
        }
    }
}
