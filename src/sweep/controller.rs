// SweepController - per-point measurement loop
//
// A sweep validates its request, takes one model snapshot, then holds the
// instrument lock for the whole run. Cancellation and the optional deadline
// are checked between points only; a point in flight always finishes or
// fails on the sampler's own retry bound.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{log_sweep_error, ErrorCode, HardwareError, SweepError};
use crate::hardware::{FrequencyRange, Instrument};
use crate::swr::{ModelStore, SwrModel};
use crate::sweep::{
    CancelToken, Measurement, SweepFailure, SweepRequest, SweepResult, SweepStatus, SweepSummary,
};

/// Instrument handle shared by every sweep; one sweep holds it at a time.
pub type SharedInstrument = Arc<Mutex<Box<dyn Instrument>>>;

/// Emitted after each completed point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepProgress {
    pub completed: usize,
    pub total: usize,
    pub measurement: Measurement,
}

impl SweepProgress {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}

#[derive(Clone)]
pub struct SweepController {
    instrument: SharedInstrument,
    range: FrequencyRange,
    models: Arc<ModelStore>,
    settling_delay: Duration,
}

impl SweepController {
    pub fn new(
        instrument: Box<dyn Instrument>,
        models: Arc<ModelStore>,
        settling_delay: Duration,
    ) -> Self {
        let range = instrument.frequency_range();
        Self {
            instrument: Arc::new(Mutex::new(instrument)),
            range,
            models,
            settling_delay,
        }
    }

    /// Build over an instrument handle that other components also hold.
    pub fn from_shared(
        instrument: SharedInstrument,
        models: Arc<ModelStore>,
        settling_delay: Duration,
    ) -> Result<Self, HardwareError> {
        let range = lock_instrument(&instrument)?.frequency_range();
        Ok(Self {
            instrument,
            range,
            models,
            settling_delay,
        })
    }

    pub fn instrument(&self) -> SharedInstrument {
        Arc::clone(&self.instrument)
    }

    pub fn models(&self) -> Arc<ModelStore> {
        Arc::clone(&self.models)
    }

    pub fn range(&self) -> FrequencyRange {
        self.range
    }

    pub fn settling_delay(&self) -> Duration {
        self.settling_delay
    }

    /// Run a sweep on the calling thread.
    ///
    /// Returns `Err` only when the sweep cannot start. Once points are
    /// being gathered every outcome is an `Ok` result whose status says
    /// whether it is complete, cancelled or partial.
    pub fn sweep(
        &self,
        request: &SweepRequest,
        cancel: &CancelToken,
        progress: Option<&broadcast::Sender<SweepProgress>>,
    ) -> Result<SweepResult, SweepError> {
        request
            .validate(self.range)
            .inspect_err(|err| log_sweep_error(err, "validate_request"))?;

        let model = self
            .models
            .snapshot()
            .map_err(|err| SweepError::ModelUnavailable {
                reason: err.message(),
            })
            .inspect_err(|err| log_sweep_error(err, "model_snapshot"))?;

        let mut instrument = lock_instrument(&self.instrument)
            .map_err(SweepError::Hardware)
            .inspect_err(|err| log_sweep_error(err, "acquire_instrument"))?;

        let grid = request.grid_mhz();
        let total = grid.len();
        let started_at = Utc::now();
        let clock = Instant::now();

        log::info!(
            "[SweepController] Sweep started: {}-{} MHz, {} points, model={:?}",
            request.start_mhz,
            request.stop_mhz,
            total,
            model.kind()
        );

        let mut measurements = Vec::with_capacity(total);
        let mut status = SweepStatus::Complete;
        let mut failure = None;

        for mhz in grid {
            if cancel.is_cancelled() {
                log::info!(
                    "[SweepController] Cancelled after {} of {} points",
                    measurements.len(),
                    total
                );
                status = SweepStatus::Cancelled;
                break;
            }

            if let Some(deadline) = request.deadline {
                let elapsed = clock.elapsed();
                if elapsed >= deadline {
                    let err = SweepError::DeadlineExceeded {
                        elapsed_ms: elapsed.as_millis(),
                        deadline_ms: deadline.as_millis(),
                    };
                    log_sweep_error(&err, "sweep_loop");
                    failure = Some(failure_record(&err, Some(mhz)));
                    status = SweepStatus::PartialFailed;
                    break;
                }
            }

            match self.measure_point(&mut **instrument, &model, mhz) {
                Ok(measurement) => {
                    tracing::debug!(
                        frequency_mhz = mhz,
                        mag_v = measurement.sample.mag_voltage,
                        swr = measurement.swr,
                        "point measured"
                    );
                    if let Some(tx) = progress {
                        // no subscribers is not an error
                        let _ = tx.send(SweepProgress {
                            completed: measurements.len() + 1,
                            total,
                            measurement: measurement.clone(),
                        });
                    }
                    measurements.push(measurement);
                }
                Err(err) => {
                    log::error!(
                        "[SweepController] Point {:.6} MHz failed after {} points: {}",
                        mhz,
                        measurements.len(),
                        err
                    );
                    failure = Some(failure_record(&err, Some(mhz)));
                    status = SweepStatus::PartialFailed;
                    break;
                }
            }
        }

        drop(instrument);

        let summary = SweepSummary::from_measurements(&measurements);
        let result = SweepResult {
            start_mhz: request.start_mhz,
            stop_mhz: request.stop_mhz,
            requested_points: request.points,
            measurements,
            summary,
            status,
            failure,
            model: model.kind(),
            started_at,
            finished_at: Utc::now(),
        };

        log::info!(
            "[SweepController] Sweep finished: status={}, points={}/{}, elapsed={:?}",
            result.status.as_str(),
            result.len(),
            total,
            clock.elapsed()
        );

        Ok(result)
    }

    fn measure_point(
        &self,
        instrument: &mut dyn Instrument,
        model: &SwrModel,
        mhz: f64,
    ) -> Result<Measurement, HardwareError> {
        let point = instrument.program(mhz * 1e6)?;
        if !self.settling_delay.is_zero() {
            thread::sleep(self.settling_delay);
        }
        let sample = instrument.sample()?;
        let swr = model.voltage_to_swr(sample.mag_voltage);
        Ok(Measurement { point, sample, swr })
    }
}

fn failure_record<E: ErrorCode>(err: &E, at_mhz: Option<f64>) -> SweepFailure {
    SweepFailure {
        code: err.code(),
        message: err.message(),
        at_mhz,
    }
}

fn lock_instrument(
    instrument: &SharedInstrument,
) -> Result<std::sync::MutexGuard<'_, Box<dyn Instrument>>, HardwareError> {
    instrument.lock().map_err(|_| HardwareError::LockPoisoned {
        component: "Instrument".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::{HardwareErrorCodes, SweepErrorCodes};
    use crate::swr::ModelKind;
    use crate::testing::{scripted_analyzer, ScriptedDetector};

    fn controller(detector: ScriptedDetector) -> SweepController {
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
    fn test_complete_sweep() {
        let c = controller(detector().with_readings([1.3, 1.04, 0.9, 1.04, 1.3], 1.6));
        let result = c
            .sweep(&SweepRequest::new(10.0, 14.0, 5), &CancelToken::new(), None)
            .unwrap();

        assert_eq!(result.status, SweepStatus::Complete);
        assert_eq!(result.len(), 5);
        assert!(result.failure.is_none());
        assert_eq!(result.model, ModelKind::Heuristic);

        let freqs: Vec<f64> = result.measurements.iter().map(|m| m.frequency_mhz()).collect();
        assert!(freqs.windows(2).all(|w| w[1] > w[0]));

        let summary = result.summary.unwrap();
        assert!((summary.min_swr - 1.0).abs() < 1e-9);
        assert!((summary.resonance_mhz - 12.0).abs() < 1e-9);
        assert!((summary.bandwidth_mhz.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_request_touches_no_hardware() {
        let det = detector().with_readings([1.0; 4], 1.6);
        let reads = det.read_count();
        let c = controller(det);

        for request in [
            SweepRequest::new(10.0, 20.0, 1),
            SweepRequest::new(20.0, 10.0, 4),
            SweepRequest::new(10.0, 50.0, 4),
        ] {
            let err = c.sweep(&request, &CancelToken::new(), None).unwrap_err();
            assert_eq!(err.code(), SweepErrorCodes::INVALID_PARAMETERS);
        }
        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_before_start_returns_empty_cancelled() {
        let c = controller(detector().with_readings([1.0; 4], 1.6));
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = c
            .sweep(&SweepRequest::new(10.0, 20.0, 4), &cancel, None)
            .unwrap();
        assert_eq!(result.status, SweepStatus::Cancelled);
        assert!(result.is_empty());
        assert!(result.summary.is_none());
    }

    #[test]
    fn test_cancel_mid_sweep_keeps_gathered_points() {
        let cancel = CancelToken::new();
        let c = controller(
            detector()
                .with_readings([1.0; 10], 1.6)
                .cancel_after(3, cancel.clone()),
        );

        let result = c
            .sweep(&SweepRequest::new(10.0, 19.0, 10), &cancel, None)
            .unwrap();
        assert_eq!(result.status, SweepStatus::Cancelled);
        assert_eq!(result.len(), 3);
        assert_eq!(result.summary.unwrap().total_points, 3);
    }

    #[test]
    fn test_exhausted_sampler_is_partial_failed() {
        let c = controller(detector().with_readings([1.0, 1.2], 1.6));

        let result = c
            .sweep(&SweepRequest::new(10.0, 19.0, 10), &CancelToken::new(), None)
            .unwrap();
        assert_eq!(result.status, SweepStatus::PartialFailed);
        assert_eq!(result.len(), 2);

        let failure = result.failure.unwrap();
        assert_eq!(failure.code, HardwareErrorCodes::TIMEOUT);
        assert!((failure.at_mhz.unwrap() - 12.0).abs() < 1e-9);
        assert!(result.summary.is_some());
    }

    #[test]
    fn test_absent_device_is_partial_failed_without_retry() {
        let det = detector().with_reading(1.0, 1.6).with_absent("no ACK");
        let reads = det.read_count();
        let c = controller(det);

        let result = c
            .sweep(&SweepRequest::new(10.0, 12.0, 3), &CancelToken::new(), None)
            .unwrap();
        assert_eq!(result.status, SweepStatus::PartialFailed);
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.failure.unwrap().code,
            HardwareErrorCodes::UNAVAILABLE
        );
        // mag + phase for the first point, one failed mag read
        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[test]
    fn test_expired_deadline_is_partial_failed() {
        let c = controller(detector().with_readings([1.0; 4], 1.6));
        let request = SweepRequest::new(10.0, 13.0, 4).with_deadline(Duration::ZERO);

        let result = c.sweep(&request, &CancelToken::new(), None).unwrap();
        assert_eq!(result.status, SweepStatus::PartialFailed);
        assert!(result.is_empty());
        assert_eq!(
            result.failure.unwrap().code,
            SweepErrorCodes::DEADLINE_EXCEEDED
        );
    }

    #[test]
    fn test_progress_reported_per_point() {
        let c = controller(detector().with_readings([1.0; 4], 1.6));
        let (tx, mut rx) = broadcast::channel(16);

        let result = c
            .sweep(&SweepRequest::new(10.0, 13.0, 4), &CancelToken::new(), Some(&tx))
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(update) = rx.try_recv() {
            seen.push(update);
        }
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0].completed, 1);
        for (i, (update, m)) in seen.iter().zip(&result.measurements).enumerate() {
            assert_eq!(update.completed, i + 1);
            assert_eq!(&update.measurement, m);
        }
        assert_eq!(seen[3].total, 4);
        assert!((seen[3].percentage() - 100.0).abs() < 1e-9);
    }
}
