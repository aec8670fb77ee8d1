use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::SweepConfig;
use crate::error::SweepError;
use crate::hardware::FrequencyRange;

/// Largest point count accepted for one sweep
pub const MAX_SWEEP_POINTS: usize = 100_000;

/// Smallest spacing between adjacent grid points
pub const MIN_STEP_HZ: f64 = 1.0;

/// Linear grid of `points` frequencies from `start` to `stop`, endpoints
/// included exactly.
///
/// `freq[i] = start + i * (stop - start) / (points - 1)`
pub fn generate_frequency_grid(start: f64, stop: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        n => {
            let last = n - 1;
            let span = stop - start;
            (0..n)
                .map(|i| {
                    if i == last {
                        stop
                    } else {
                        start + i as f64 * span / last as f64
                    }
                })
                .collect()
        }
    }
}

/// Parameters of one sweep run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRequest {
    pub start_mhz: f64,
    pub stop_mhz: f64,
    pub points: usize,
    /// Wall-clock bound for the whole run; unbounded when `None`
    #[serde(default)]
    pub deadline: Option<Duration>,
}

impl SweepRequest {
    pub fn new(start_mhz: f64, stop_mhz: f64, points: usize) -> Self {
        Self {
            start_mhz,
            stop_mhz,
            points,
            deadline: None,
        }
    }

    pub fn from_config(config: &SweepConfig) -> Self {
        Self {
            start_mhz: config.start_mhz,
            stop_mhz: config.stop_mhz,
            points: config.points,
            deadline: config.deadline(),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Grid in MHz.
    pub fn grid_mhz(&self) -> Vec<f64> {
        generate_frequency_grid(self.start_mhz, self.stop_mhz, self.points)
    }

    /// Check bounds against the instrument span. Never touches hardware
    /// and never allocates the grid.
    pub fn validate(&self, range: FrequencyRange) -> Result<(), SweepError> {
        if self.points < 2 {
            return Err(invalid(format!("n_points must be >= 2, got {}", self.points)));
        }
        if self.points > MAX_SWEEP_POINTS {
            return Err(invalid(format!(
                "n_points must be <= {}, got {}",
                MAX_SWEEP_POINTS, self.points
            )));
        }
        if !self.start_mhz.is_finite() || !self.stop_mhz.is_finite() {
            return Err(invalid("start and stop frequencies must be finite".to_string()));
        }
        if self.start_mhz >= self.stop_mhz {
            return Err(invalid(format!(
                "start frequency {} MHz must be below stop frequency {} MHz",
                self.start_mhz, self.stop_mhz
            )));
        }
        for (name, mhz) in [("start", self.start_mhz), ("stop", self.stop_mhz)] {
            if !range.contains(mhz * 1e6) {
                return Err(invalid(format!(
                    "{} frequency {} MHz outside supported range [{}, {}] MHz",
                    name,
                    mhz,
                    range.min_hz / 1e6,
                    range.max_hz / 1e6
                )));
            }
        }
        let step_hz = (self.stop_mhz - self.start_mhz) * 1e6 / (self.points - 1) as f64;
        if step_hz < MIN_STEP_HZ {
            return Err(invalid(format!(
                "{} points do not fit between {} and {} MHz ({:.3e} Hz step, minimum {} Hz)",
                self.points, self.start_mhz, self.stop_mhz, step_hz, MIN_STEP_HZ
            )));
        }
        Ok(())
    }
}

fn invalid(reason: String) -> SweepError {
    SweepError::InvalidParameters { reason }
}
