//! Integration tests for the sweep pipeline
//!
//! These drive `SweepController` through the public API with the scripted
//! instrument doubles from `antenna_analyzer::testing`:
//! - Tuning words sent to the DDS for every grid point
//! - Cancellation and permanent hardware failure after k points
//! - Mutual exclusion between concurrent sweeps on one instrument
//! - Progress events from a background sweep

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use antenna_analyzer::config::AppConfig;
use antenna_analyzer::error::{ErrorCode, HardwareErrorCodes, SweepError};
use antenna_analyzer::hardware::{Analyzer, FrequencyProgrammer, RetryPolicy, Sampler};
use antenna_analyzer::rating::{Grade, RatingEngine};
use antenna_analyzer::sweep::{
    generate_frequency_grid, CancelToken, SweepController, SweepRequest, SweepStatus,
};
use antenna_analyzer::swr::{ModelKind, ModelStore};
use antenna_analyzer::testing::{scripted_analyzer, RecordingDds, ScriptedDetector};

fn controller_for(detector: ScriptedDetector) -> SweepController {
    let config = AppConfig::default();
    SweepController::new(
        Box::new(scripted_analyzer(&config, detector)),
        Arc::new(ModelStore::default()),
        Duration::ZERO,
    )
}

fn detector() -> ScriptedDetector {
    ScriptedDetector::new(AppConfig::default().instrument.lsb_volts())
}

#[test]
fn test_grid_matches_documented_example() {
    let grid = generate_frequency_grid(10.0, 20.0, 11);
    let expected: Vec<f64> = (10..=20).map(|f| f as f64).collect();
    assert_eq!(grid.len(), expected.len());
    for (got, want) in grid.iter().zip(&expected) {
        assert!((got - want).abs() < 1e-12, "{} != {}", got, want);
    }
}

#[test]
fn test_every_point_programs_its_tuning_word() {
    let config = AppConfig::default();
    let dds = RecordingDds::new();
    let latched = dds.latched_words();
    let sampler = Sampler::new(
        detector().with_readings(vec![1.0; 11], 1.6),
        config.instrument.lsb_volts(),
        RetryPolicy::no_backoff(3),
    );
    let analyzer = Analyzer::new(
        FrequencyProgrammer::from_config(&config.instrument),
        dds,
        sampler,
    );
    let controller = SweepController::new(
        Box::new(analyzer),
        Arc::new(ModelStore::default()),
        Duration::ZERO,
    );

    let result = controller
        .sweep(
            &SweepRequest::new(10.0, 20.0, 11),
            &CancelToken::new(),
            None,
        )
        .unwrap();

    let words = latched.lock().unwrap().clone();
    assert_eq!(words.len(), 11);
    for (word, m) in words.iter().zip(&result.measurements) {
        let expected = (m.point.frequency_hz * 4_294_967_296.0 / 125_000_000.0).round() as u32;
        assert_eq!(*word, expected);
        assert_eq!(m.point.tuning_word, expected);
    }
}

#[test]
fn test_cancel_after_k_points() {
    for k in [1usize, 3, 6] {
        let token = CancelToken::new();
        let controller = controller_for(
            detector()
                .with_readings(vec![1.2; 10], 1.6)
                .cancel_after(k, token.clone()),
        );

        let result = controller
            .sweep(&SweepRequest::new(10.0, 19.0, 10), &token, None)
            .unwrap();

        assert_eq!(result.status, SweepStatus::Cancelled);
        assert_eq!(result.len(), k);
        assert!(result.failure.is_none());
        let freqs: Vec<f64> = result.measurements.iter().map(|m| m.frequency_mhz()).collect();
        assert!(freqs.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_permanent_failure_after_k_points() {
    for k in [0usize, 2, 5] {
        // script runs dry after k readings; every retry then fails transiently
        let controller = controller_for(detector().with_readings(vec![1.0; k], 1.6));

        let result = controller
            .sweep(&SweepRequest::new(10.0, 19.0, 10), &CancelToken::new(), None)
            .unwrap();

        assert_eq!(result.status, SweepStatus::PartialFailed);
        assert_eq!(result.len(), k);
        let failure = result.failure.as_ref().unwrap();
        assert_eq!(failure.code, HardwareErrorCodes::TIMEOUT);
        assert_eq!(failure.at_mhz, Some(10.0 + k as f64));
        assert_eq!(result.summary.is_some(), k > 0);
    }
}

#[test]
fn test_partial_results_are_still_rated() {
    let controller = controller_for(detector().with_readings([1.0, 1.0, 1.3], 1.6));
    let result = controller
        .sweep(&SweepRequest::new(10.0, 19.0, 10), &CancelToken::new(), None)
        .unwrap();
    assert_eq!(result.len(), 3);

    let rating = RatingEngine::new().rate(&result);
    assert!(rating.score > 0);
    assert!(rating.analysis.contains("partial_failed"));
}

#[test]
fn test_rejected_request_never_touches_hardware() {
    let detector = detector().with_readings(vec![1.0; 5], 1.6);
    let reads = detector.read_count();
    let controller = controller_for(detector);

    for request in [
        SweepRequest::new(10.0, 20.0, 1),
        SweepRequest::new(20.0, 10.0, 5),
        SweepRequest::new(10.0, 50.0, 5),
        SweepRequest::new(f64::NAN, 20.0, 5),
        SweepRequest::new(10.0, 20.0, usize::MAX),
    ] {
        let err = controller
            .sweep(&request, &CancelToken::new(), None)
            .unwrap_err();
        assert!(matches!(err, SweepError::InvalidParameters { .. }));
        assert_eq!(err.code(), 2001);
    }
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[test]
fn test_concurrent_sweeps_are_serialized() {
    // first sweep reads 1.0 V five times, second reads 1.3 V five times
    let mags: Vec<f64> = std::iter::repeat(1.0)
        .take(5)
        .chain(std::iter::repeat(1.3).take(5))
        .collect();
    let controller = controller_for(detector().with_readings(mags, 1.6));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let controller = controller.clone();
            thread::spawn(move || {
                controller
                    .sweep(&SweepRequest::new(10.0, 14.0, 5), &CancelToken::new(), None)
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for result in &results {
        assert!(result.is_complete());
        assert_eq!(result.len(), 5);
        // each sweep saw only its own block of readings
        let first = result.measurements[0].swr;
        assert!(result.swr_values().all(|swr| (swr - first).abs() < 1e-6));
    }
    let mut firsts: Vec<f64> = results.iter().map(|r| r.measurements[0].swr).collect();
    firsts.sort_by(f64::total_cmp);
    assert!((firsts[0] - 1.0).abs() < 1e-6);
    assert!((firsts[1] - 5.0).abs() < 0.01);
}

#[test]
fn test_background_sweep_reports_every_point() {
    let controller = controller_for(detector().with_readings(vec![1.0; 8], 1.6));
    let mut task = controller.spawn(SweepRequest::new(10.0, 17.0, 8)).unwrap();
    let mut progress = task.take_progress().unwrap();

    let result = task.join().unwrap();
    let mut completed = Vec::new();
    while let Ok(update) = progress.try_recv() {
        completed.push(update.completed);
    }

    assert_eq!(completed, (1..=8).collect::<Vec<_>>());
    assert_eq!(result.model, ModelKind::Heuristic);

    let rating = RatingEngine::new().rate(&result);
    // min 1.0, avg 1.0, all good
    assert_eq!(rating.score, 100);
    assert_eq!(rating.grade, Grade::APlus);
}
