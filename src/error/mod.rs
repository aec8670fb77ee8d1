// Error types for the antenna analyzer
//
// This module defines custom error types for instrument, sweep, calibration
// and persistence operations, providing structured error handling with
// numeric error codes suitable for CLI exit reporting and logs.

mod calibration;
mod hardware;
mod storage;
mod sweep;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use hardware::{log_hardware_error, HardwareError, HardwareErrorCodes};
pub use storage::{log_storage_error, StorageError, StorageErrorCodes};
pub use sweep::{log_sweep_error, SweepError, SweepErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library and the CLI.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
