// CalibrationDeriver - fit SWR model parameters from reference datasets
//
// The with_antenna class anchors the matched end of the curve and the
// without_antenna class (open feed) anchors the mismatched end:
//
//   knee_v  = midpoint of the two magnitude means        -> SWR 3.0
//   match_v = with_mean + with_std (capped at knee_v)    -> SWR 1.0
//   tail    = slope that carries knee_v to SWR 10.0 at without_mean
//
// A fit is refused when the class means are not separated by at least
// `separation_factor` times the larger class spread.

use serde::{Deserialize, Serialize};

use crate::calibration::dataset::{AntennaLabel, CalibrationDataset, VoltageStats};
use crate::calibration::report::CalibrationReport;
use crate::config::CalibrationConfig;
use crate::error::{log_calibration_error, CalibrationError};
use crate::swr::{Breakpoint, SwrModel, SwrModelParams, MIN_SWR};

/// SWR assigned to the knee between the two classes
pub const KNEE_SWR: f64 = 3.0;
/// SWR the without_antenna mean maps to
pub const OPEN_SWR: f64 = 10.0;

/// Suggested parameters derived from one fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    pub match_voltage: f64,
    pub knee_voltage: f64,
    pub knee_swr: f64,
    pub open_swr: f64,
    pub tail_slope: f64,
    /// Magnitude voltage separating the two classes
    pub detection_threshold: f64,
}

impl CalibrationParameters {
    pub fn to_model_params(&self) -> Result<SwrModelParams, CalibrationError> {
        SwrModelParams::new(
            vec![
                Breakpoint::new(self.match_voltage, MIN_SWR),
                Breakpoint::new(self.knee_voltage, self.knee_swr),
            ],
            self.tail_slope,
        )
    }

    /// True when `mag_voltage` falls on the with_antenna side of the threshold.
    pub fn antenna_connected(&self, mag_voltage: f64) -> bool {
        mag_voltage < self.detection_threshold
    }
}

/// Output of a successful fit.
#[derive(Debug, Clone)]
pub struct CalibrationFit {
    pub model: SwrModel,
    pub parameters: CalibrationParameters,
    pub report: CalibrationReport,
}

#[derive(Debug, Clone)]
pub struct CalibrationDeriver {
    separation_factor: f64,
    min_samples: usize,
}

impl CalibrationDeriver {
    pub fn new(separation_factor: f64, min_samples: usize) -> Self {
        Self {
            separation_factor: separation_factor.max(0.0),
            min_samples: min_samples.max(1),
        }
    }

    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self::new(config.separation_factor, config.min_samples_per_class)
    }

    pub fn separation_factor(&self) -> f64 {
        self.separation_factor
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Fit a calibrated model from the two reference classes.
    ///
    /// # Errors
    /// * `InvalidDataset` - a dataset carries the wrong label or a non-finite voltage
    /// * `InsufficientSamples` - a class has fewer than `min_samples` points
    /// * `InsufficientSeparation` - the classes are too close to tell apart
    pub fn fit(
        &self,
        with_antenna: &CalibrationDataset,
        without_antenna: &CalibrationDataset,
    ) -> Result<CalibrationFit, CalibrationError> {
        let result = self.fit_inner(with_antenna, without_antenna);
        if let Err(err) = &result {
            log_calibration_error(err, "fit");
        }
        result
    }

    fn fit_inner(
        &self,
        with_antenna: &CalibrationDataset,
        without_antenna: &CalibrationDataset,
    ) -> Result<CalibrationFit, CalibrationError> {
        let with_stats = self.class_stats(with_antenna, AntennaLabel::WithAntenna)?;
        let without_stats = self.class_stats(without_antenna, AntennaLabel::WithoutAntenna)?;

        let separation = without_stats.mean - with_stats.mean;
        let required = self.separation_factor * with_stats.std.max(without_stats.std);

        if separation <= 0.0 {
            return Err(CalibrationError::InsufficientSeparation {
                separation,
                required,
                reason: format!(
                    "with_antenna mean {:.3} V is not below without_antenna mean {:.3} V",
                    with_stats.mean, without_stats.mean
                ),
            });
        }
        if separation < required {
            return Err(CalibrationError::InsufficientSeparation {
                separation,
                required,
                reason: format!(
                    "class spread too large (std {:.3} V / {:.3} V)",
                    with_stats.std, without_stats.std
                ),
            });
        }

        let knee_voltage = (with_stats.mean + without_stats.mean) / 2.0;
        let match_voltage = (with_stats.mean + with_stats.std).min(knee_voltage);
        let tail_slope = (OPEN_SWR - KNEE_SWR) / (without_stats.mean - knee_voltage);

        let parameters = CalibrationParameters {
            match_voltage,
            knee_voltage,
            knee_swr: KNEE_SWR,
            open_swr: OPEN_SWR,
            tail_slope,
            detection_threshold: knee_voltage,
        };
        let model = SwrModel::calibrated(parameters.to_model_params()?);

        let report = CalibrationReport::new(
            with_stats,
            without_stats,
            with_antenna.phase_stats(),
            without_antenna.phase_stats(),
            separation,
            required,
            parameters,
        );

        log::info!(
            "[CalibrationDeriver] Fit accepted: match {:.3} V, knee {:.3} V, slope {:.2} SWR/V",
            match_voltage,
            knee_voltage,
            tail_slope
        );

        Ok(CalibrationFit {
            model,
            parameters,
            report,
        })
    }

    fn class_stats(
        &self,
        dataset: &CalibrationDataset,
        expected: AntennaLabel,
    ) -> Result<VoltageStats, CalibrationError> {
        if dataset.label() != expected {
            return Err(CalibrationError::InvalidDataset {
                reason: format!(
                    "expected a {} dataset, got {}",
                    expected.as_str(),
                    dataset.label().as_str()
                ),
            });
        }
        if dataset.len() < self.min_samples {
            return Err(CalibrationError::InsufficientSamples {
                label: expected.as_str().to_string(),
                required: self.min_samples,
                collected: dataset.len(),
            });
        }
        let magnitudes = dataset.magnitudes();
        if let Some(i) = magnitudes.iter().position(|v| !v.is_finite()) {
            return Err(CalibrationError::InvalidDataset {
                reason: format!("{} point {} has a non-finite voltage", expected.as_str(), i),
            });
        }
        VoltageStats::from_values(&magnitudes).ok_or_else(|| CalibrationError::InsufficientSamples {
            label: expected.as_str().to_string(),
            required: self.min_samples,
            collected: 0,
        })
    }
}

impl Default for CalibrationDeriver {
    fn default() -> Self {
        Self::from_config(&CalibrationConfig::default())
    }
}
