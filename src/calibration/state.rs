// CalibrationState - persisted record of the active SWR model
//
// The state is either the default heuristic (not calibrated) or a fitted
// model with the parameters and time it was derived. It is saved as JSON so
// a calibration survives restarts.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calibration::deriver::{CalibrationFit, CalibrationParameters};
use crate::error::CalibrationError;
use crate::swr::{ModelKind, SwrModel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    /// Whether the model was fitted from reference data
    pub is_calibrated: bool,
    pub model: SwrModel,
    /// Fit parameters; absent for the heuristic
    #[serde(default)]
    pub parameters: Option<CalibrationParameters>,
    #[serde(default)]
    pub fitted_at: Option<DateTime<Utc>>,
}

impl CalibrationState {
    /// Uncalibrated state using the default heuristic.
    pub fn new_default() -> Self {
        Self {
            is_calibrated: false,
            model: SwrModel::heuristic(),
            parameters: None,
            fitted_at: None,
        }
    }

    pub fn from_fit(fit: &CalibrationFit) -> Self {
        Self {
            is_calibrated: true,
            model: fit.model.clone(),
            parameters: Some(fit.parameters),
            fitted_at: Some(Utc::now()),
        }
    }

    /// Fit parameters, or `NotCalibrated` for the heuristic.
    pub fn parameters(&self) -> Result<&CalibrationParameters, CalibrationError> {
        self.parameters.as_ref().ok_or(CalibrationError::NotCalibrated)
    }

    /// Read a saved state.
    ///
    /// A file whose flag disagrees with its model kind is rejected.
    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let contents = fs::read_to_string(path).map_err(|err| CalibrationError::Persistence {
            reason: format!("failed to read {}: {}", path.display(), err),
        })?;
        let state: Self =
            serde_json::from_str(&contents).map_err(|err| CalibrationError::Persistence {
                reason: format!("failed to parse {}: {}", path.display(), err),
            })?;

        let fitted = state.model.kind() == ModelKind::Calibrated;
        if state.is_calibrated != fitted {
            return Err(CalibrationError::Persistence {
                reason: format!(
                    "{}: is_calibrated={} but model is {:?}",
                    path.display(),
                    state.is_calibrated,
                    state.model.kind()
                ),
            });
        }
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<(), CalibrationError> {
        let json =
            serde_json::to_string_pretty(self).map_err(|err| CalibrationError::Persistence {
                reason: format!("failed to serialize calibration: {}", err),
            })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| CalibrationError::Persistence {
                reason: format!("failed to create {}: {}", parent.display(), err),
            })?;
        }
        fs::write(path, json).map_err(|err| CalibrationError::Persistence {
            reason: format!("failed to write {}: {}", path.display(), err),
        })
    }
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self::new_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{AntennaLabel, CalibrationDataset, CalibrationDeriver};
    use crate::hardware::{FrequencyPoint, Sample};

    fn fit() -> CalibrationFit {
        let mut with = CalibrationDataset::new(AntennaLabel::WithAntenna);
        let mut without = CalibrationDataset::new(AntennaLabel::WithoutAntenna);
        for i in 0..5 {
            let point = FrequencyPoint::at((10.0 + i as f64) * 1e6, 125e6);
            with.push(point, Sample::new(0.3, 1.6));
            without.push(point, Sample::new(1.8, 1.6));
        }
        CalibrationDeriver::default().fit(&with, &without).unwrap()
    }

    #[test]
    fn test_new_default() {
        let state = CalibrationState::new_default();
        assert!(!state.is_calibrated);
        assert_eq!(state.model.kind(), ModelKind::Heuristic);
        assert!(matches!(
            state.parameters(),
            Err(CalibrationError::NotCalibrated)
        ));
    }

    #[test]
    fn test_from_fit() {
        let state = CalibrationState::from_fit(&fit());
        assert!(state.is_calibrated);
        assert_eq!(state.model.kind(), ModelKind::Calibrated);
        assert!(state.fitted_at.is_some());
        assert!((state.parameters().unwrap().knee_voltage - 1.05).abs() < 1e-9);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("calibration.json");
        let state = CalibrationState::from_fit(&fit());
        state.save(&path).unwrap();

        let loaded = CalibrationState::load(&path).unwrap();
        assert!(loaded.is_calibrated);
        assert!((loaded.model.voltage_to_swr(1.8) - 10.0).abs() < 1e-6);
        assert_eq!(loaded.parameters, state.parameters);
    }

    #[test]
    fn test_load_rejects_bad_breakpoints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        let json = r#"{
            "is_calibrated": true,
            "model": {
                "kind": "calibrated",
                "params": {
                    "breakpoints": [{"voltage": 1.0, "swr": 3.0}, {"voltage": 0.5, "swr": 1.0}],
                    "tail_slope": 10.0
                }
            }
        }"#;
        fs::write(&path, json).unwrap();
        assert!(matches!(
            CalibrationState::load(&path),
            Err(CalibrationError::Persistence { .. })
        ));
    }

    #[test]
    fn test_load_rejects_inconsistent_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        let mut state = CalibrationState::new_default();
        state.is_calibrated = true;
        state.save(&path).unwrap();
        assert!(matches!(
            CalibrationState::load(&path),
            Err(CalibrationError::Persistence { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CalibrationState::load(&dir.path().join("missing.json")),
            Err(CalibrationError::Persistence { .. })
        ));
    }
}
