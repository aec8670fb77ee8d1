// Result persistence error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::io;
use std::path::Path;

/// Storage error code constants
///
/// Error code range: 4001-4003
pub struct StorageErrorCodes {}

impl StorageErrorCodes {
    pub const IO: i32 = 4001;
    pub const SERIALIZATION: i32 = 4002;
    pub const NOT_FOUND: i32 = 4003;
}

/// Log a persistence error. Persistence failures are surfaced but never
/// invalidate the in-memory sweep they were trying to save.
pub fn log_storage_error(err: &StorageError, context: &str) {
    error!(
        "Storage error in {}: code={}, component=ResultStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Save/load failures for sweep records and calibration datasets
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Filesystem read/write failed
    Io { path: String, reason: String },

    /// JSON encode/decode failed
    Serialization { path: String, reason: String },

    /// Requested record does not exist
    NotFound { path: String },
}

impl StorageError {
    /// Classify a filesystem error on `path`; a missing file maps to `NotFound`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound {
                path: path.display().to_string(),
            }
        } else {
            StorageError::Io {
                path: path.display().to_string(),
                reason: err.to_string(),
            }
        }
    }

    pub fn serialization(path: &Path, err: serde_json::Error) -> Self {
        StorageError::Serialization {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

impl ErrorCode for StorageError {
    fn code(&self) -> i32 {
        match self {
            StorageError::Io { .. } => StorageErrorCodes::IO,
            StorageError::Serialization { .. } => StorageErrorCodes::SERIALIZATION,
            StorageError::NotFound { .. } => StorageErrorCodes::NOT_FOUND,
        }
    }

    fn message(&self) -> String {
        match self {
            StorageError::Io { path, reason } => format!("I/O error on {}: {}", path, reason),
            StorageError::Serialization { path, reason } => {
                format!("Malformed record {}: {}", path, reason)
            }
            StorageError::NotFound { path } => format!("Record not found: {}", path),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StorageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_codes() {
        assert_eq!(
            StorageError::Io {
                path: "a".to_string(),
                reason: "b".to_string()
            }
            .code(),
            4001
        );
        assert_eq!(
            StorageError::Serialization {
                path: "a".to_string(),
                reason: "b".to_string()
            }
            .code(),
            4002
        );
        assert_eq!(
            StorageError::NotFound {
                path: "a".to_string()
            }
            .code(),
            StorageErrorCodes::NOT_FOUND
        );
    }

    #[test]
    fn test_storage_error_message() {
        let err = StorageError::NotFound {
            path: "antenna_test_20240101_000000.json".to_string(),
        };
        assert!(err.message().contains("antenna_test_20240101_000000.json"));
    }
}
