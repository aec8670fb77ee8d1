// Sweep error types and constants

use crate::error::{ErrorCode, HardwareError};
use log::error;
use std::fmt;

/// Sweep error code constants
///
/// Error code range: 2001-2005
pub struct SweepErrorCodes {}

impl SweepErrorCodes {
    /// Sweep bounds or point count rejected before any hardware access
    pub const INVALID_PARAMETERS: i32 = 2001;

    /// Active SWR model could not be read
    pub const MODEL_UNAVAILABLE: i32 = 2002;

    /// Instrument could not be acquired before the first point
    pub const HARDWARE: i32 = 2003;

    /// Background sweep worker terminated abnormally
    pub const TASK_FAILED: i32 = 2004;

    /// Wall-clock bound elapsed between points
    pub const DEADLINE_EXCEEDED: i32 = 2005;
}

/// Log a sweep error with structured context
pub fn log_sweep_error(err: &SweepError, context: &str) {
    error!(
        "Sweep error in {}: code={}, component=SweepController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Sweep errors
///
/// Failures that happen once points are being gathered are never returned
/// as `Err`; they end the sweep with a `PartialFailed` result whose failure
/// record carries the code and message (`DeadlineExceeded` only ever
/// appears there).
///
/// Error code range: 2001-2005
#[derive(Debug, Clone, PartialEq)]
pub enum SweepError {
    /// Bad sweep bounds, point count, or endpoints outside the tuning span
    InvalidParameters { reason: String },

    /// Model store could not provide a snapshot
    ModelUnavailable { reason: String },

    /// Instrument access failed before the sweep began
    Hardware(HardwareError),

    /// Worker thread panicked
    TaskFailed { reason: String },

    /// Sweep ran past its deadline
    DeadlineExceeded { elapsed_ms: u128, deadline_ms: u128 },
}

impl ErrorCode for SweepError {
    fn code(&self) -> i32 {
        match self {
            SweepError::InvalidParameters { .. } => SweepErrorCodes::INVALID_PARAMETERS,
            SweepError::ModelUnavailable { .. } => SweepErrorCodes::MODEL_UNAVAILABLE,
            SweepError::Hardware(_) => SweepErrorCodes::HARDWARE,
            SweepError::TaskFailed { .. } => SweepErrorCodes::TASK_FAILED,
            SweepError::DeadlineExceeded { .. } => SweepErrorCodes::DEADLINE_EXCEEDED,
        }
    }

    fn message(&self) -> String {
        match self {
            SweepError::InvalidParameters { reason } => {
                format!("Invalid sweep parameters: {}", reason)
            }
            SweepError::ModelUnavailable { reason } => {
                format!("SWR model unavailable: {}", reason)
            }
            SweepError::Hardware(err) => format!("Instrument error: {}", err.message()),
            SweepError::TaskFailed { reason } => format!("Sweep task failed: {}", reason),
            SweepError::DeadlineExceeded {
                elapsed_ms,
                deadline_ms,
            } => format!(
                "Sweep deadline exceeded: {} ms elapsed, limit {} ms",
                elapsed_ms, deadline_ms
            ),
        }
    }
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SweepError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SweepError {}

impl From<HardwareError> for SweepError {
    fn from(err: HardwareError) -> Self {
        SweepError::Hardware(err)
    }
}
