// Human-readable summary of a calibration fit

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calibration::dataset::VoltageStats;
use crate::calibration::deriver::CalibrationParameters;

/// Separation above this many combined standard deviations is reported as good.
pub const GOOD_SEPARATION_SIGMAS: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub with_magnitude: VoltageStats,
    pub without_magnitude: VoltageStats,
    pub with_phase: Option<VoltageStats>,
    pub without_phase: Option<VoltageStats>,
    /// without_mean - with_mean
    pub separation: f64,
    /// Minimum separation the fit demanded
    pub required_separation: f64,
    pub combined_std: f64,
    pub good_separation: bool,
    pub parameters: CalibrationParameters,
}

impl CalibrationReport {
    pub fn new(
        with_magnitude: VoltageStats,
        without_magnitude: VoltageStats,
        with_phase: Option<VoltageStats>,
        without_phase: Option<VoltageStats>,
        separation: f64,
        required_separation: f64,
        parameters: CalibrationParameters,
    ) -> Self {
        let combined_std = (with_magnitude.std.powi(2) + without_magnitude.std.powi(2)).sqrt();
        Self {
            with_magnitude,
            without_magnitude,
            with_phase,
            without_phase,
            separation,
            required_separation,
            combined_std,
            good_separation: separation > GOOD_SEPARATION_SIGMAS * combined_std,
            parameters,
        }
    }
}

fn write_stats(f: &mut fmt::Formatter<'_>, name: &str, stats: &VoltageStats) -> fmt::Result {
    writeln!(
        f,
        "  {:<8} mean {:.4} V  std {:.4} V  range {:.4}-{:.4} V  (n={})",
        name, stats.mean, stats.std, stats.min, stats.max, stats.count
    )
}

impl fmt::Display for CalibrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Calibration report")?;
        writeln!(f, "With antenna:")?;
        write_stats(f, "mag", &self.with_magnitude)?;
        if let Some(phase) = &self.with_phase {
            write_stats(f, "phase", phase)?;
        }
        writeln!(f, "Without antenna:")?;
        write_stats(f, "mag", &self.without_magnitude)?;
        if let Some(phase) = &self.without_phase {
            write_stats(f, "phase", phase)?;
        }
        writeln!(
            f,
            "Separation: {:.4} V (required {:.4} V, combined std {:.4} V) - {}",
            self.separation,
            self.required_separation,
            self.combined_std,
            if self.good_separation {
                "good"
            } else {
                "marginal"
            }
        )?;
        let p = &self.parameters;
        writeln!(f, "Suggested parameters:")?;
        writeln!(f, "  match voltage  {:.4} V -> SWR 1.0", p.match_voltage)?;
        writeln!(
            f,
            "  knee voltage   {:.4} V -> SWR {:.1}",
            p.knee_voltage, p.knee_swr
        )?;
        writeln!(f, "  tail slope     {:.3} SWR/V", p.tail_slope)?;
        write!(
            f,
            "  antenna detected when magnitude < {:.4} V",
            p.detection_threshold
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(mean: f64, std: f64) -> VoltageStats {
        VoltageStats {
            count: 10,
            min: mean - std,
            max: mean + std,
            mean,
            std,
        }
    }

    fn params() -> CalibrationParameters {
        CalibrationParameters {
            match_voltage: 0.32,
            knee_voltage: 1.05,
            knee_swr: 3.0,
            open_swr: 10.0,
            tail_slope: 9.33,
            detection_threshold: 1.05,
        }
    }

    #[test]
    fn test_good_separation_uses_combined_std() {
        let report = CalibrationReport::new(
            stats(0.3, 0.03),
            stats(1.8, 0.04),
            None,
            None,
            1.5,
            0.08,
            params(),
        );
        assert!((report.combined_std - 0.05).abs() < 1e-12);
        assert!(report.good_separation);

        let marginal = CalibrationReport::new(
            stats(0.3, 0.3),
            stats(1.8, 0.4),
            None,
            None,
            1.5,
            0.8,
            params(),
        );
        assert!(!marginal.good_separation);
    }

    #[test]
    fn test_report_text() {
        let report = CalibrationReport::new(
            stats(0.3, 0.03),
            stats(1.8, 0.04),
            Some(stats(1.6, 0.1)),
            None,
            1.5,
            0.08,
            params(),
        );
        let text = report.to_string();
        assert!(text.contains("With antenna:"));
        assert!(text.contains("mean 0.3000 V"));
        assert!(text.contains("phase"));
        assert!(text.contains("good"));
        assert!(text.contains("knee voltage   1.0500 V -> SWR 3.0"));
    }
}
