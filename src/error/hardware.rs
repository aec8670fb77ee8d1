// Hardware error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Hardware error code constants
///
/// Error code range: 1001-1005
pub struct HardwareErrorCodes {}

impl HardwareErrorCodes {
    /// Requested frequency is outside the instrument's supported span
    pub const FREQUENCY_OUT_OF_RANGE: i32 = 1001;

    /// Transient bus fault persisted after all retries
    pub const TIMEOUT: i32 = 1002;

    /// Device absent or non-responsive
    pub const UNAVAILABLE: i32 = 1003;

    /// Single bus operation failed (before retry classification)
    pub const BUS_FAULT: i32 = 1004;

    /// Instrument handle mutex was poisoned
    pub const LOCK_POISONED: i32 = 1005;
}

/// Log a hardware error with structured context
///
/// Logs the numeric code, the component and the human-readable message.
pub fn log_hardware_error(err: &HardwareError, context: &str) {
    error!(
        "Hardware error in {}: code={}, component=Instrument, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Instrument-related errors
///
/// These errors cover the signal source (tuning) and the detector front end
/// (sampling). Retry policy decides which of them are escalated.
///
/// Error code range: 1001-1005
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareError {
    /// Frequency outside the supported span
    FrequencyOutOfRange {
        frequency_hz: f64,
        min_hz: f64,
        max_hz: f64,
    },

    /// Transient bus fault that did not clear within the retry bound
    HardwareTimeout { attempts: u32, last_fault: String },

    /// Device not found on the bus; retrying cannot help
    HardwareUnavailable { details: String },

    /// A single GPIO/bus operation failed
    BusFault { details: String },

    /// Mutex guarding the instrument was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for HardwareError {
    fn code(&self) -> i32 {
        match self {
            HardwareError::FrequencyOutOfRange { .. } => {
                HardwareErrorCodes::FREQUENCY_OUT_OF_RANGE
            }
            HardwareError::HardwareTimeout { .. } => HardwareErrorCodes::TIMEOUT,
            HardwareError::HardwareUnavailable { .. } => HardwareErrorCodes::UNAVAILABLE,
            HardwareError::BusFault { .. } => HardwareErrorCodes::BUS_FAULT,
            HardwareError::LockPoisoned { .. } => HardwareErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            HardwareError::FrequencyOutOfRange {
                frequency_hz,
                min_hz,
                max_hz,
            } => format!(
                "Frequency {} Hz out of range [{}, {}] Hz",
                frequency_hz, min_hz, max_hz
            ),
            HardwareError::HardwareTimeout {
                attempts,
                last_fault,
            } => format!(
                "Hardware timeout after {} attempts: {}",
                attempts, last_fault
            ),
            HardwareError::HardwareUnavailable { details } => {
                format!("Hardware unavailable: {}", details)
            }
            HardwareError::BusFault { details } => format!("Bus fault: {}", details),
            HardwareError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
        }
    }
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HardwareError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for HardwareError {}
