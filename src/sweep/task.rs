// Background sweep execution
//
// `SweepController::spawn` runs the blocking loop on a dedicated worker
// thread. The caller keeps a `SweepTask`: cancel it, subscribe to its
// per-point progress, and join it for the final result. The worker owns
// the only strong progress sender, so receivers close when the sweep returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::{log_sweep_error, SweepError};
use crate::sweep::{SweepController, SweepProgress, SweepRequest, SweepResult};

/// Upper bound on buffered progress events per task
const MAX_PROGRESS_BUFFER: usize = 4096;

/// Cooperative cancellation flag, checked between sweep points.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Handle to a sweep running on a worker thread.
pub struct SweepTask {
    cancel: CancelToken,
    progress_tx: broadcast::WeakSender<SweepProgress>,
    progress_rx: Option<broadcast::Receiver<SweepProgress>>,
    handle: JoinHandle<Result<SweepResult, SweepError>>,
}

impl SweepTask {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Receiver created before the worker started, so it sees every point.
    /// Only the first call returns it.
    pub fn take_progress(&mut self) -> Option<broadcast::Receiver<SweepProgress>> {
        self.progress_rx.take()
    }

    /// Additional receiver; sees only points completed after this call.
    /// Already closed when the worker has finished.
    pub fn subscribe(&self) -> broadcast::Receiver<SweepProgress> {
        match self.progress_tx.upgrade() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Progress as an async stream that ends when the sweep finishes.
    ///
    /// Uses the receiver from `take_progress` when still available, so the
    /// first stream observes every point. Lagged events are skipped.
    pub fn progress_stream(&mut self) -> impl Stream<Item = SweepProgress> {
        let receiver = self
            .progress_rx
            .take()
            .unwrap_or_else(|| self.subscribe());
        BroadcastStream::new(receiver).filter_map(|result| async move {
            match result {
                Ok(progress) => Some(progress),
                Err(err) => {
                    log::warn!("[SweepTask] Progress subscriber lagged: {}", err);
                    None
                }
            }
        })
    }

    /// Wait for the worker and return its result.
    pub fn join(self) -> Result<SweepResult, SweepError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => {
                let err = SweepError::TaskFailed {
                    reason: "sweep worker panicked".to_string(),
                };
                log_sweep_error(&err, "join");
                Err(err)
            }
        }
    }
}

impl SweepController {
    /// Start `request` on a worker thread.
    pub fn spawn(&self, request: SweepRequest) -> Result<SweepTask, SweepError> {
        let capacity = request.points.clamp(1, MAX_PROGRESS_BUFFER);
        let (progress_tx, progress_rx) = broadcast::channel(capacity);
        let cancel = CancelToken::new();

        let weak_tx = progress_tx.downgrade();
        let controller = self.clone();
        let worker_cancel = cancel.clone();

        let handle = thread::Builder::new()
            .name("sweep-worker".to_string())
            .spawn(move || controller.sweep(&request, &worker_cancel, Some(&progress_tx)))
            .map_err(|err| SweepError::TaskFailed {
                reason: format!("failed to spawn sweep worker: {}", err),
            })
            .inspect_err(|err| log_sweep_error(err, "spawn"))?;

        Ok(SweepTask {
            cancel,
            progress_tx: weak_tx,
            progress_rx: Some(progress_rx),
            handle,
        })
    }
}
