// SWRModel - magnitude voltage to SWR mapping
//
// Both the fixed heuristic and fitted models share one piecewise-linear
// shape: flat at the first breakpoint's SWR below it, linear between
// consecutive breakpoints, then a straight tail of `tail_slope` SWR per volt
// beyond the last breakpoint. Every output is clamped to [MIN_SWR, MAX_SWR].

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Perfect match
pub const MIN_SWR: f64 = 1.0;
/// Upper clamp for any mapped SWR
pub const MAX_SWR: f64 = 50.0;

/// Default heuristic knee, from detector compression on the reference board
pub const HEURISTIC_MATCH_V: f64 = 1.0;
pub const HEURISTIC_KNEE_V: f64 = 1.1;
pub const HEURISTIC_KNEE_SWR: f64 = 3.0;
pub const HEURISTIC_TAIL_SLOPE: f64 = 10.0;

/// Voltage threshold and the SWR it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub voltage: f64,
    pub swr: f64,
}

impl Breakpoint {
    pub fn new(voltage: f64, swr: f64) -> Self {
        Self { voltage, swr }
    }
}

/// Validated piecewise-linear model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParams")]
pub struct SwrModelParams {
    breakpoints: Vec<Breakpoint>,
    tail_slope: f64,
}

impl SwrModelParams {
    /// Validate and build parameters.
    ///
    /// Breakpoints must be non-empty, finite, ordered by voltage and
    /// non-decreasing in SWR; the tail slope must be finite and >= 0.
    pub fn new(breakpoints: Vec<Breakpoint>, tail_slope: f64) -> Result<Self, CalibrationError> {
        if breakpoints.is_empty() {
            return Err(invalid("at least one breakpoint is required"));
        }
        if !tail_slope.is_finite() || tail_slope < 0.0 {
            return Err(invalid(&format!("tail slope {} must be finite and >= 0", tail_slope)));
        }
        for (i, bp) in breakpoints.iter().enumerate() {
            if !bp.voltage.is_finite() || !bp.swr.is_finite() {
                return Err(invalid(&format!("breakpoint {} is not finite", i)));
            }
            if !(MIN_SWR..=MAX_SWR).contains(&bp.swr) {
                return Err(invalid(&format!(
                    "breakpoint {} SWR {} outside [{}, {}]",
                    i, bp.swr, MIN_SWR, MAX_SWR
                )));
            }
        }
        for (i, pair) in breakpoints.windows(2).enumerate() {
            if pair[1].voltage < pair[0].voltage {
                return Err(invalid(&format!(
                    "breakpoint {} voltage {} below previous {}",
                    i + 1,
                    pair[1].voltage,
                    pair[0].voltage
                )));
            }
            if pair[1].swr < pair[0].swr {
                return Err(invalid(&format!(
                    "breakpoint {} SWR {} below previous {}",
                    i + 1,
                    pair[1].swr,
                    pair[0].swr
                )));
            }
        }

        Ok(Self {
            breakpoints,
            tail_slope,
        })
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn tail_slope(&self) -> f64 {
        self.tail_slope
    }

    fn first(&self) -> Breakpoint {
        self.breakpoints[0]
    }

    fn last(&self) -> Breakpoint {
        self.breakpoints[self.breakpoints.len() - 1]
    }
}

/// Unvalidated wire form; deserialization goes through `SwrModelParams::new`.
#[derive(Deserialize)]
struct RawParams {
    breakpoints: Vec<Breakpoint>,
    tail_slope: f64,
}

impl TryFrom<RawParams> for SwrModelParams {
    type Error = CalibrationError;

    fn try_from(raw: RawParams) -> Result<Self, Self::Error> {
        Self::new(raw.breakpoints, raw.tail_slope)
    }
}

fn invalid(reason: &str) -> CalibrationError {
    CalibrationError::InvalidModel {
        reason: reason.to_string(),
    }
}

/// Where a model's parameters came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Heuristic,
    Calibrated,
}

/// Magnitude-voltage to SWR mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwrModel {
    kind: ModelKind,
    params: SwrModelParams,
}

impl SwrModel {
    /// The fixed default mapping:
    ///
    /// ```text
    /// v <= 1.0        -> 1.0
    /// 1.0 < v <= 1.1  -> 1.0 + ((v - 1.0) / 0.1) * 2.0
    /// v > 1.1         -> 3.0 + (v - 1.1) * 10.0
    /// ```
    pub fn heuristic() -> Self {
        Self {
            kind: ModelKind::Heuristic,
            params: SwrModelParams {
                breakpoints: vec![
                    Breakpoint::new(HEURISTIC_MATCH_V, MIN_SWR),
                    Breakpoint::new(HEURISTIC_KNEE_V, HEURISTIC_KNEE_SWR),
                ],
                tail_slope: HEURISTIC_TAIL_SLOPE,
            },
        }
    }

    /// Model built from fitted parameters.
    pub fn calibrated(params: SwrModelParams) -> Self {
        Self {
            kind: ModelKind::Calibrated,
            params,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn params(&self) -> &SwrModelParams {
        &self.params
    }

    /// Map a magnitude voltage to SWR, clamped to [MIN_SWR, MAX_SWR].
    ///
    /// NaN maps to MAX_SWR so an unreadable detector never looks matched.
    pub fn voltage_to_swr(&self, voltage: f64) -> f64 {
        if voltage.is_nan() {
            return MAX_SWR;
        }

        let bps = &self.params.breakpoints;
        let first = self.params.first();
        if voltage <= first.voltage {
            return clamp_swr(first.swr);
        }

        for pair in bps.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if voltage <= b.voltage {
                let width = b.voltage - a.voltage;
                if width <= 0.0 {
                    return clamp_swr(b.swr);
                }
                let t = (voltage - a.voltage) / width;
                return clamp_swr(a.swr + t * (b.swr - a.swr));
            }
        }

        let last = self.params.last();
        if self.params.tail_slope == 0.0 {
            return clamp_swr(last.swr);
        }
        clamp_swr(last.swr + (voltage - last.voltage) * self.params.tail_slope)
    }

    /// Smallest voltage that maps to `swr` (inverse of `voltage_to_swr`).
    ///
    /// SWR values below the first breakpoint return its voltage; a flat
    /// tail returns the last breakpoint voltage.
    pub fn voltage_for_swr(&self, swr: f64) -> f64 {
        let first = self.params.first();
        if swr.is_nan() || swr <= first.swr {
            return first.voltage;
        }

        for pair in self.params.breakpoints.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if swr <= b.swr {
                let rise = b.swr - a.swr;
                if rise <= 0.0 {
                    return a.voltage;
                }
                return a.voltage + (swr - a.swr) / rise * (b.voltage - a.voltage);
            }
        }

        let last = self.params.last();
        if self.params.tail_slope > 0.0 {
            last.voltage + (swr - last.swr) / self.params.tail_slope
        } else {
            last.voltage
        }
    }
}

impl Default for SwrModel {
    fn default() -> Self {
        Self::heuristic()
    }
}

fn clamp_swr(swr: f64) -> f64 {
    swr.clamp(MIN_SWR, MAX_SWR)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_heuristic_reference_points() {
        let model = SwrModel::heuristic();
        assert!((model.voltage_to_swr(0.0) - 1.0).abs() < EPS);
        assert!((model.voltage_to_swr(0.5) - 1.0).abs() < EPS);
        assert!((model.voltage_to_swr(1.0) - 1.0).abs() < EPS);
        assert!((model.voltage_to_swr(1.05) - 2.0).abs() < EPS);
        assert!((model.voltage_to_swr(1.1) - 3.0).abs() < EPS);
        assert!((model.voltage_to_swr(1.3) - 5.0).abs() < EPS);
    }

    #[test]
    fn test_heuristic_clamped_for_extreme_inputs() {
        let model = SwrModel::heuristic();
        for v in [-1e9, -3.3, -0.0, 6.0, 1e9, f64::MAX, f64::MIN, f64::INFINITY] {
            let swr = model.voltage_to_swr(v);
            assert!((MIN_SWR..=MAX_SWR).contains(&swr), "v={} swr={}", v, swr);
        }
        assert_eq!(model.voltage_to_swr(10.0), MAX_SWR);
        assert_eq!(model.voltage_to_swr(f64::NAN), MAX_SWR);
    }

    #[test]
    fn test_heuristic_monotonic() {
        let model = SwrModel::heuristic();
        let mut prev = model.voltage_to_swr(-1.0);
        for i in 0..=600 {
            let v = -1.0 + i as f64 * 0.01;
            let swr = model.voltage_to_swr(v);
            assert!(swr >= prev, "non-monotonic at v={}", v);
            prev = swr;
        }
    }

    #[test]
    fn test_voltage_for_swr_inverts_heuristic() {
        let model = SwrModel::heuristic();
        for swr in [1.5, 2.0, 3.0, 3.5, 5.0, 10.0] {
            let v = model.voltage_for_swr(swr);
            assert!((model.voltage_to_swr(v) - swr).abs() < 1e-9, "swr={}", swr);
        }
        assert!((model.voltage_for_swr(1.0) - 1.0).abs() < EPS);
        assert!((model.voltage_for_swr(0.5) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_calibrated_interpolation() {
        let params = SwrModelParams::new(
            vec![Breakpoint::new(0.4, 1.0), Breakpoint::new(1.0, 3.0)],
            5.0,
        )
        .unwrap();
        let model = SwrModel::calibrated(params);
        assert_eq!(model.kind(), ModelKind::Calibrated);
        assert!((model.voltage_to_swr(0.3) - 1.0).abs() < EPS);
        assert!((model.voltage_to_swr(0.7) - 2.0).abs() < EPS);
        assert!((model.voltage_to_swr(1.8) - 7.0).abs() < EPS);
    }

    #[test]
    fn test_flat_tail_holds_last_breakpoint() {
        let flat = SwrModel::calibrated(
            SwrModelParams::new(
                vec![Breakpoint::new(0.4, 1.0), Breakpoint::new(1.0, 3.0)],
                0.0,
            )
            .unwrap(),
        );
        for v in [1.5, 1e9, f64::MAX, f64::INFINITY] {
            assert!((flat.voltage_to_swr(v) - 3.0).abs() < EPS, "v={}", v);
        }

        let steep = SwrModel::calibrated(
            SwrModelParams::new(vec![Breakpoint::new(0.4, 1.0)], 5.0).unwrap(),
        );
        assert_eq!(steep.voltage_to_swr(f64::INFINITY), MAX_SWR);
        assert_eq!(steep.voltage_to_swr(f64::NEG_INFINITY), MIN_SWR);
    }

    #[test]
    fn test_zero_width_segment_is_a_step() {
        let params = SwrModelParams::new(
            vec![Breakpoint::new(1.0, 1.0), Breakpoint::new(1.0, 2.0)],
            1.0,
        )
        .unwrap();
        let model = SwrModel::calibrated(params);
        assert!((model.voltage_to_swr(1.0) - 1.0).abs() < EPS);
        assert!((model.voltage_to_swr(1.5) - 2.5).abs() < EPS);
    }

    #[test]
    fn test_params_validation() {
        assert!(SwrModelParams::new(vec![], 1.0).is_err());
        assert!(SwrModelParams::new(vec![Breakpoint::new(1.0, 1.0)], -1.0).is_err());
        assert!(SwrModelParams::new(vec![Breakpoint::new(f64::NAN, 1.0)], 1.0).is_err());
        assert!(SwrModelParams::new(vec![Breakpoint::new(1.0, 0.5)], 1.0).is_err());
        // out of voltage order
        assert!(SwrModelParams::new(
            vec![Breakpoint::new(1.0, 1.0), Breakpoint::new(0.5, 2.0)],
            1.0
        )
        .is_err());
        // decreasing SWR
        let err = SwrModelParams::new(
            vec![Breakpoint::new(0.5, 3.0), Breakpoint::new(1.0, 2.0)],
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, CalibrationError::InvalidModel { .. }));
    }

    #[test]
    fn test_model_json_roundtrip() {
        let model = SwrModel::heuristic();
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"heuristic\""));
        let parsed: SwrModel = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, model);
    }

    #[test]
    fn test_deserialize_rejects_invalid_params() {
        let json = r#"{"kind":"calibrated","params":{"breakpoints":[{"voltage":1.0,"swr":3.0},{"voltage":0.5,"swr":1.0}],"tail_slope":2.0}}"#;
        assert!(serde_json::from_str::<SwrModel>(json).is_err());
    }
}
