// ModelStore - process-wide active SWR model
//
// Readers take an `Arc` snapshot and keep it for as long as they need a
// consistent model; replacing the model swaps the pointer and never touches
// a snapshot already handed out.

use std::sync::{Arc, RwLock};

use crate::error::CalibrationError;
use crate::swr::SwrModel;

pub struct ModelStore {
    active: RwLock<Arc<SwrModel>>,
}

impl ModelStore {
    pub fn new(model: SwrModel) -> Self {
        Self {
            active: RwLock::new(Arc::new(model)),
        }
    }

    /// Current model, shared.
    pub fn snapshot(&self) -> Result<Arc<SwrModel>, CalibrationError> {
        self.active
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    /// Install `model`, returning the one it replaced.
    pub fn replace(&self, model: SwrModel) -> Result<Arc<SwrModel>, CalibrationError> {
        let mut guard = self
            .active
            .write()
            .map_err(|_| CalibrationError::StatePoisoned)?;
        let previous = std::mem::replace(&mut *guard, Arc::new(model));
        log::info!(
            "[ModelStore] Active SWR model replaced ({:?} -> {:?})",
            previous.kind(),
            guard.kind()
        );
        Ok(previous)
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new(SwrModel::heuristic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swr::{Breakpoint, ModelKind, SwrModelParams};

    fn calibrated() -> SwrModel {
        SwrModel::calibrated(
            SwrModelParams::new(
                vec![Breakpoint::new(0.4, 1.0), Breakpoint::new(1.0, 3.0)],
                5.0,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_default_is_heuristic() {
        let store = ModelStore::default();
        assert_eq!(store.snapshot().unwrap().kind(), ModelKind::Heuristic);
    }

    #[test]
    fn test_snapshot_unaffected_by_replace() {
        let store = ModelStore::default();
        let held = store.snapshot().unwrap();

        let previous = store.replace(calibrated()).unwrap();

        assert_eq!(previous.kind(), ModelKind::Heuristic);
        assert_eq!(held.kind(), ModelKind::Heuristic);
        assert!((held.voltage_to_swr(1.3) - 5.0).abs() < 1e-9);
        assert_eq!(store.snapshot().unwrap().kind(), ModelKind::Calibrated);
    }

    #[test]
    fn test_concurrent_readers_see_whole_models() {
        let store = Arc::new(ModelStore::default());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    let model = store.snapshot().unwrap();
                    let swr = model.voltage_to_swr(1.0);
                    match model.kind() {
                        ModelKind::Heuristic => assert!((swr - 1.0).abs() < 1e-9),
                        ModelKind::Calibrated => assert!((swr - 3.0).abs() < 1e-9),
                    }
                }
            }));
        }
        for _ in 0..50 {
            store.replace(calibrated()).unwrap();
            store.replace(SwrModel::heuristic()).unwrap();
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
