// CalibrationManager: Focused manager for the active SWR model
//
// Single Responsibility: fitting, installing and persisting calibrations.
// The model store is shared with the sweep controller; a model is only
// ever swapped in after a fit or load fully succeeds.

use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::calibration::{CalibrationDataset, CalibrationDeriver, CalibrationFit, CalibrationState};
use crate::error::{log_calibration_error, CalibrationError};
use crate::swr::ModelStore;

/// Manages calibration state and the active model
///
/// This manager handles:
/// - Fitting a model from two reference datasets
/// - Installing the fitted model into the shared `ModelStore`
/// - Loading/saving the calibration state as JSON
/// - Resetting to the default heuristic
///
/// # Example
/// ```ignore
/// let manager = CalibrationManager::new(models, CalibrationDeriver::default());
/// let fit = manager.fit_and_apply(&with, &without)?;
/// manager.save_file(Path::new("calibration.json"))?;
/// ```
pub struct CalibrationManager {
    models: Arc<ModelStore>,
    state: Arc<RwLock<CalibrationState>>,
    deriver: CalibrationDeriver,
}

impl CalibrationManager {
    /// Create a manager in the uncalibrated state.
    ///
    /// The store is reset to the heuristic so state and store agree.
    pub fn new(models: Arc<ModelStore>, deriver: CalibrationDeriver) -> Self {
        let manager = Self {
            models,
            state: Arc::new(RwLock::new(CalibrationState::new_default())),
            deriver,
        };
        if let Err(err) = manager.models.replace(CalibrationState::new_default().model) {
            log_calibration_error(&err, "new");
        }
        manager
    }

    pub fn model_store(&self) -> Arc<ModelStore> {
        Arc::clone(&self.models)
    }

    pub fn deriver(&self) -> &CalibrationDeriver {
        &self.deriver
    }

    /// Fit without installing anything.
    pub fn fit(
        &self,
        with_antenna: &CalibrationDataset,
        without_antenna: &CalibrationDataset,
    ) -> Result<CalibrationFit, CalibrationError> {
        self.deriver.fit(with_antenna, without_antenna)
    }

    /// Fit and, on success, make the fitted model active.
    ///
    /// # Errors
    /// - Any fit failure; the active model is left untouched
    /// - Lock poisoning on the state or the model store
    pub fn fit_and_apply(
        &self,
        with_antenna: &CalibrationDataset,
        without_antenna: &CalibrationDataset,
    ) -> Result<CalibrationFit, CalibrationError> {
        let fit = self.fit(with_antenna, without_antenna)?;
        self.load_state(CalibrationState::from_fit(&fit))?;
        Ok(fit)
    }

    /// Install `state` and its model.
    pub fn load_state(&self, state: CalibrationState) -> Result<(), CalibrationError> {
        let mut state_guard = self.write_state().inspect_err(|err| {
            log_calibration_error(err, "load_state");
        })?;

        self.models
            .replace(state.model.clone())
            .inspect_err(|err| log_calibration_error(err, "load_state"))?;
        *state_guard = state;
        Ok(())
    }

    /// Clone of the current calibration state.
    pub fn get_state(&self) -> Result<CalibrationState, CalibrationError> {
        let state_guard = self.read_state().inspect_err(|err| {
            log_calibration_error(err, "get_state");
        })?;

        Ok(state_guard.clone())
    }

    pub fn is_calibrated(&self) -> Result<bool, CalibrationError> {
        Ok(self.read_state()?.is_calibrated)
    }

    /// Restore a saved calibration and make it active.
    pub fn load_file(&self, path: &Path) -> Result<(), CalibrationError> {
        let state = CalibrationState::load(path)
            .inspect_err(|err| log_calibration_error(err, "load_file"))?;
        let calibrated = state.is_calibrated;
        self.load_state(state)?;
        log::info!(
            "[CalibrationManager] Loaded calibration from {:?} (calibrated={})",
            path,
            calibrated
        );
        Ok(())
    }

    pub fn save_file(&self, path: &Path) -> Result<(), CalibrationError> {
        let state = self.get_state()?;
        state
            .save(path)
            .inspect_err(|err| log_calibration_error(err, "save_file"))?;
        log::info!("[CalibrationManager] Saved calibration to {:?}", path);
        Ok(())
    }

    /// Drop any calibration and go back to the heuristic.
    pub fn reset_to_default(&self) -> Result<(), CalibrationError> {
        self.load_state(CalibrationState::new_default())
    }

    // ========================================================================
    // HELPER METHODS - Lock management
    // ========================================================================

    fn read_state(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, CalibrationState>, CalibrationError> {
        self.state
            .read()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    fn write_state(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, CalibrationState>, CalibrationError> {
        self.state
            .write()
            .map_err(|_| CalibrationError::StatePoisoned)
    }
}

impl Default for CalibrationManager {
    fn default() -> Self {
        Self::new(Arc::new(ModelStore::default()), CalibrationDeriver::default())
    }
}
