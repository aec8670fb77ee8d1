// Reference data collection
//
// Runs an ordinary sweep with heavier averaging and keeps the raw
// (point, sample) pairs under one label. The SWR computed along the way is
// discarded; only voltages feed the deriver.

use crate::calibration::dataset::{AntennaLabel, CalibrationDataset};
use crate::error::{log_sweep_error, HardwareError, SweepError};
use crate::sweep::{CancelToken, SweepController, SweepFailure, SweepRequest, SweepStatus};

/// Labeled dataset plus how the underlying sweep ended.
#[derive(Debug, Clone)]
pub struct Collection {
    pub dataset: CalibrationDataset,
    pub status: SweepStatus,
    pub failure: Option<SweepFailure>,
}

impl Collection {
    pub fn is_complete(&self) -> bool {
        self.status == SweepStatus::Complete
    }
}

/// Sweep `request` and label every measured point.
///
/// `samples_per_point` overrides the instrument's averaging for the
/// duration of the collection and is restored afterwards.
pub fn collect_dataset(
    controller: &SweepController,
    request: &SweepRequest,
    label: AntennaLabel,
    samples_per_point: usize,
    cancel: &CancelToken,
) -> Result<Collection, SweepError> {
    let previous = set_averaging(controller, samples_per_point)?;

    log::info!(
        "[Collector] Collecting {} data: {}-{} MHz, {} points, {} conversions/point",
        label.as_str(),
        request.start_mhz,
        request.stop_mhz,
        request.points,
        samples_per_point
    );

    let outcome = controller.sweep(request, cancel, None);
    set_averaging(controller, previous)?;
    let result = outcome?;

    let mut dataset = CalibrationDataset::new(label);
    for measurement in &result.measurements {
        dataset.push(measurement.point, measurement.sample.clone());
    }

    if let Some(stats) = dataset.magnitude_stats() {
        log::info!(
            "[Collector] {} points, magnitude mean {:.4} V std {:.4} V",
            stats.count,
            stats.mean,
            stats.std
        );
    }

    Ok(Collection {
        dataset,
        status: result.status,
        failure: result.failure,
    })
}

fn set_averaging(
    controller: &SweepController,
    samples_per_point: usize,
) -> Result<usize, SweepError> {
    let instrument = controller.instrument();
    let mut guard = instrument
        .lock()
        .map_err(|_| {
            SweepError::Hardware(HardwareError::LockPoisoned {
                component: "Instrument".to_string(),
            })
        })
        .inspect_err(|err| log_sweep_error(err, "collect_dataset"))?;
    Ok(guard.set_averaging(samples_per_point))
}
