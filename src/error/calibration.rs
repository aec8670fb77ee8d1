// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// These constants provide a single source of truth for error codes used
/// by the CLI exit status and log lines.
///
/// Error code range: 3001-3007
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// The two classes are not far enough apart to fit a model
    pub const INSUFFICIENT_SEPARATION: i32 = 3001;

    /// A class has too few samples to compute a spread
    pub const INSUFFICIENT_SAMPLES: i32 = 3002;

    /// Dataset is malformed (wrong label, non-finite voltage)
    pub const INVALID_DATASET: i32 = 3003;

    /// No calibrated model is available
    pub const NOT_CALIBRATED: i32 = 3004;

    /// Model store RwLock was poisoned
    pub const STATE_POISONED: i32 = 3005;

    /// Calibrated parameters could not be read or written
    pub const PERSISTENCE: i32 = 3006;

    /// Model breakpoints violate ordering or monotonicity
    pub const INVALID_MODEL: i32 = 3007;
}

/// Log a calibration error with structured context
///
/// This function logs calibration errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationDeriver, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// These errors cover fitting a voltage-to-SWR model from labeled reference
/// datasets and managing the active model.
///
/// Error code range: 3001-3007
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Class means are too close relative to their spread
    InsufficientSeparation {
        separation: f64,
        required: f64,
        reason: String,
    },

    /// Too few samples in one class
    InsufficientSamples {
        label: String,
        required: usize,
        collected: usize,
    },

    /// Dataset contents rejected
    InvalidDataset { reason: String },

    /// No calibrated parameters loaded
    NotCalibrated,

    /// Model store lock poisoned
    StatePoisoned,

    /// Reading or writing calibrated parameters failed
    Persistence { reason: String },

    /// SWR model parameters rejected
    InvalidModel { reason: String },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::InsufficientSeparation { .. } => {
                CalibrationErrorCodes::INSUFFICIENT_SEPARATION
            }
            CalibrationError::InsufficientSamples { .. } => {
                CalibrationErrorCodes::INSUFFICIENT_SAMPLES
            }
            CalibrationError::InvalidDataset { .. } => CalibrationErrorCodes::INVALID_DATASET,
            CalibrationError::NotCalibrated => CalibrationErrorCodes::NOT_CALIBRATED,
            CalibrationError::StatePoisoned => CalibrationErrorCodes::STATE_POISONED,
            CalibrationError::Persistence { .. } => CalibrationErrorCodes::PERSISTENCE,
            CalibrationError::InvalidModel { .. } => CalibrationErrorCodes::INVALID_MODEL,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::InsufficientSeparation {
                separation,
                required,
                reason,
            } => format!(
                "Insufficient separation: {:.3} V (need >= {:.3} V): {}",
                separation, required, reason
            ),
            CalibrationError::InsufficientSamples {
                label,
                required,
                collected,
            } => format!(
                "Insufficient samples for {}: need {}, got {}",
                label, required, collected
            ),
            CalibrationError::InvalidDataset { reason } => {
                format!("Invalid dataset: {}", reason)
            }
            CalibrationError::NotCalibrated => "No calibrated model available".to_string(),
            CalibrationError::StatePoisoned => "Model store lock poisoned".to_string(),
            CalibrationError::Persistence { reason } => {
                format!("Calibration persistence failed: {}", reason)
            }
            CalibrationError::InvalidModel { reason } => {
                format!("Invalid SWR model parameters: {}", reason)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
