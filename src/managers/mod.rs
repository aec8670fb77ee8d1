// Managers Module
//
// Focused manager classes owned by the engine handle.
//
// - CalibrationManager: active SWR model, calibration fitting and persistence

pub mod calibration_manager;

pub use calibration_manager::CalibrationManager;
