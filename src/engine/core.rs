//! EngineHandle: orchestration layer shared by the CLI and tests.
//!
//! Owns the sweep controller, the calibration manager (and through it the
//! active SWR model), the rating engine and the result store, and publishes
//! `EngineEvent`s for anything a front end might want to show.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::calibration::{
    collect_dataset, AntennaLabel, CalibrationDataset, CalibrationDeriver, CalibrationFit,
    Collection,
};
use crate::config::AppConfig;
use crate::error::{CalibrationError, StorageError, SweepError};
use crate::hardware::{Instrument, SimulatedAntenna};
use crate::managers::CalibrationManager;
use crate::rating::{Rating, RatingEngine};
use crate::storage::{ResultStore, SweepRecord};
use crate::swr::{ModelKind, ModelStore};
use crate::sweep::{
    CancelToken, SweepController, SweepRequest, SweepResult, SweepStatus, SweepTask,
};

const EVENT_BUFFER: usize = 128;

/// Event emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Milliseconds since the handle was created
    pub timestamp_ms: u64,
    pub kind: EngineEventKind,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEventKind {
    SweepStarted { points: usize },
    SweepFinished { status: SweepStatus, points: usize },
    ModelReplaced { kind: ModelKind },
    Warning,
}

pub struct EngineHandle {
    config: AppConfig,
    controller: SweepController,
    calibration: CalibrationManager,
    rating: RatingEngine,
    store: ResultStore,
    events_tx: broadcast::Sender<EngineEvent>,
    start_instant: Instant,
}

impl EngineHandle {
    /// Wire every component around `instrument`.
    pub fn new(config: AppConfig, instrument: Box<dyn Instrument>) -> Self {
        let models = Arc::new(ModelStore::default());
        let calibration = CalibrationManager::new(
            Arc::clone(&models),
            CalibrationDeriver::from_config(&config.calibration),
        );
        let controller =
            SweepController::new(instrument, models, config.sweep.settling_delay());
        let store = ResultStore::from_config(&config.storage);
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);

        Self {
            config,
            controller,
            calibration,
            rating: RatingEngine::new(),
            store,
            events_tx,
            start_instant: Instant::now(),
        }
    }

    /// Engine over a simulated antenna.
    pub fn simulated(config: AppConfig, antenna: SimulatedAntenna) -> Self {
        let analyzer = antenna.into_analyzer(&config);
        Self::new(config, Box::new(analyzer))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn controller(&self) -> &SweepController {
        &self.controller
    }

    pub fn calibration(&self) -> &CalibrationManager {
        &self.calibration
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Request built from the configured sweep defaults.
    pub fn default_request(&self) -> SweepRequest {
        SweepRequest::from_config(&self.config.sweep)
    }

    fn emit_event(&self, kind: EngineEventKind, detail: Option<String>) {
        let timestamp_ms = self.start_instant.elapsed().as_millis() as u64;
        // no subscribers is fine
        let _ = self.events_tx.send(EngineEvent {
            timestamp_ms,
            kind,
            detail,
        });
    }

    fn emit_finished(&self, result: &SweepResult) {
        self.emit_event(
            EngineEventKind::SweepFinished {
                status: result.status,
                points: result.len(),
            },
            result.failure.as_ref().map(|f| f.message.clone()),
        );
    }

    // ========================================================================
    // SWEEP METHODS
    // ========================================================================

    /// Run a sweep on the calling thread.
    pub fn run_sweep(
        &self,
        request: &SweepRequest,
        cancel: &CancelToken,
    ) -> Result<SweepResult, SweepError> {
        self.emit_event(
            EngineEventKind::SweepStarted {
                points: request.points,
            },
            None,
        );
        let result = self.controller.sweep(request, cancel, None).inspect_err(|err| {
            self.emit_event(EngineEventKind::Warning, Some(err.to_string()));
        })?;
        self.emit_finished(&result);
        Ok(result)
    }

    /// Start a sweep on a worker thread; finish it with `finish_sweep`.
    pub fn start_sweep(&self, request: SweepRequest) -> Result<SweepTask, SweepError> {
        let points = request.points;
        let task = self.controller.spawn(request)?;
        self.emit_event(EngineEventKind::SweepStarted { points }, None);
        Ok(task)
    }

    pub fn finish_sweep(&self, task: SweepTask) -> Result<SweepResult, SweepError> {
        let result = task.join().inspect_err(|err| {
            self.emit_event(EngineEventKind::Warning, Some(err.to_string()));
        })?;
        self.emit_finished(&result);
        Ok(result)
    }

    pub fn rate(&self, result: &SweepResult) -> Rating {
        self.rating.rate(result)
    }

    /// Persist a rated sweep. A failure is reported but leaves both inputs intact.
    pub fn save(&self, result: &SweepResult, rating: &Rating) -> Result<PathBuf, StorageError> {
        self.store
            .save(&SweepRecord::from_result(result, rating))
            .inspect_err(|err| {
                self.emit_event(EngineEventKind::Warning, Some(err.to_string()));
            })
    }

    // ========================================================================
    // CALIBRATION METHODS
    // ========================================================================

    /// Collect one labeled reference dataset with the configured averaging.
    pub fn collect(
        &self,
        request: &SweepRequest,
        label: AntennaLabel,
        cancel: &CancelToken,
    ) -> Result<Collection, SweepError> {
        collect_dataset(
            &self.controller,
            request,
            label,
            self.config.calibration.collect_samples_per_point,
            cancel,
        )
    }

    /// Fit and install a calibrated model. Failures keep the current model.
    pub fn calibrate(
        &self,
        with_antenna: &CalibrationDataset,
        without_antenna: &CalibrationDataset,
    ) -> Result<CalibrationFit, CalibrationError> {
        match self.calibration.fit_and_apply(with_antenna, without_antenna) {
            Ok(fit) => {
                self.emit_event(
                    EngineEventKind::ModelReplaced {
                        kind: fit.model.kind(),
                    },
                    None,
                );
                Ok(fit)
            }
            Err(err) => {
                self.emit_event(EngineEventKind::Warning, Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Load the persisted calibration if one exists.
    ///
    /// Returns `Ok(false)` when there is no file at the configured path.
    pub fn restore_calibration(&self) -> Result<bool, CalibrationError> {
        let path = &self.config.calibration.model_path;
        if !path.exists() {
            log::info!(
                "[EngineHandle] No saved calibration at {:?}, using heuristic",
                path
            );
            return Ok(false);
        }
        self.calibration.load_file(path)?;
        let kind = self.calibration.model_store().snapshot()?.kind();
        self.emit_event(EngineEventKind::ModelReplaced { kind }, None);
        Ok(true)
    }

    pub fn save_calibration(&self) -> Result<(), CalibrationError> {
        self.calibration
            .save_file(Path::new(&self.config.calibration.model_path))
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// Events as an async stream; lagged events are skipped.
    pub fn event_stream(&self) -> impl Stream<Item = EngineEvent> {
        BroadcastStream::new(self.events_tx.subscribe()).filter_map(|result| async move {
            match result {
                Ok(event) => Some(event),
                Err(err) => {
                    log::warn!("[EngineHandle] Event subscriber lagged: {}", err);
                    None
                }
            }
        })
    }
}
