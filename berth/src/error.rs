//! Error types for the berth library.
//!
//! Detector failures never surface through this type to callers of
//! [`crate::PortScanner::scan`]; they are logged and skipped. Everything
//! else (store failures, contention, bad configuration) is an [`Error`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for operations that may fail with a berth error.
///
/// # Examples
///
/// ```
/// use berth::{Error, Result};
///
/// fn example_operation() -> Result<u16> {
///     Ok(3000)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the berth library.
#[derive(Debug, Error)]
pub enum Error {
    /// An invalid port number was provided.
    #[error("invalid port {value}: {reason}")]
    InvalidPort {
        /// The invalid port value.
        value: u16,
        /// The reason the port is invalid.
        reason: String,
    },

    /// An invalid port range was specified.
    #[error("invalid port range {min}-{max}: {reason}")]
    InvalidPortRange {
        /// The minimum port in the range.
        min: u16,
        /// The maximum port in the range.
        max: u16,
        /// The reason the range is invalid.
        reason: String,
    },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A configuration error occurred.
    #[error("configuration error: {0}")]
    Configuration(#[from] serde_yaml::Error),

    /// A JSON (de)serialization error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A validation error occurred.
    #[error("validation error for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// A description of the validation failure.
        message: String,
    },

    /// The allocations record could not be written.
    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        /// The store location being written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The allocations record changed between load and save.
    #[error("concurrent modification: expected revision {expected}, found {found}")]
    ConcurrentModification {
        /// The revision the writer loaded.
        expected: u64,
        /// The revision currently stored.
        found: u64,
    },

    /// The store lock could not be acquired in time.
    #[error("store lock timeout after {seconds}s")]
    LockTimeout {
        /// The number of seconds waited before timing out.
        seconds: u64,
    },

    /// No free port could be found for a service.
    #[error("no port available for '{service}': {reason}")]
    AllocationExhausted {
        /// The service that could not be placed.
        service: String,
        /// What was attempted.
        reason: String,
    },

    /// A detection method could not run.
    #[error("detection method '{method}' unavailable: {reason}")]
    DetectionUnavailable {
        /// The detection method.
        method: String,
        /// Why it could not run.
        reason: String,
    },

    /// An artifact could not be produced in the requested format.
    #[error("artifact format '{format}' unavailable: {reason}")]
    ArtifactFormatUnavailable {
        /// The format that failed.
        format: String,
        /// Why it failed.
        reason: String,
    },

    /// The requested resource was not found.
    #[error("not found: {resource}")]
    NotFound {
        /// The resource that was not found.
        resource: String,
    },

    /// No template with the given name exists.
    #[error("unknown template '{name}'")]
    UnknownTemplate {
        /// The requested template name.
        name: String,
    },

    /// An unsupported schema version was encountered.
    #[error("unsupported schema version: expected {expected}, found {found}")]
    UnsupportedSchemaVersion {
        /// The expected schema version.
        expected: u32,
        /// The schema version found in the store.
        found: u32,
    },
}

impl From<crate::port::InvalidPortError> for Error {
    fn from(err: crate::port::InvalidPortError) -> Self {
        Self::InvalidPort {
            value: err.value,
            reason: err.reason,
        }
    }
}

impl From<crate::port::InvalidPortRangeError> for Error {
    fn from(err: crate::port::InvalidPortRangeError) -> Self {
        Self::InvalidPortRange {
            min: err.min,
            max: err.max,
            reason: err.reason,
        }
    }
}

impl Error {
    /// Returns `true` for store contention errors the allocator may retry.
    ///
    /// ```
    /// use berth::Error;
    ///
    /// assert!(Error::ConcurrentModification { expected: 1, found: 2 }.is_contention());
    /// assert!(Error::LockTimeout { seconds: 5 }.is_contention());
    /// assert!(!Error::NotFound { resource: "x".into() }.is_contention());
    /// ```
    #[must_use]
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification { .. } | Self::LockTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_port_error() {
        let err = Error::InvalidPort {
            value: 0,
            reason: "port 0 is invalid".to_string(),
        };
        let display = format!("{err}");
        assert!(display.contains("invalid port"));
        assert!(display.contains('0'));
    }

    #[test]
    fn test_validation_error() {
        let err = Error::Validation {
            field: "project".to_string(),
            message: "must be non-empty".to_string(),
        };
        let display = format!("{err}");
        assert!(display.contains("validation error"));
        assert!(display.contains("project"));
        assert!(display.contains("must be non-empty"));
    }

    #[test]
    fn test_persistence_error_keeps_path() {
        let err = Error::Persistence {
            path: PathBuf::from("/data/allocations.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let display = format!("{err}").replace(std::path::MAIN_SEPARATOR, "/");
        assert!(display.contains("/data/allocations.json"));
        assert!(display.contains("denied"));
    }

    #[test]
    fn test_concurrent_modification_error() {
        let err = Error::ConcurrentModification {
            expected: 3,
            found: 4,
        };
        let display = format!("{err}");
        assert!(display.contains("expected revision 3"));
        assert!(display.contains("found 4"));
    }

    #[test]
    fn test_allocation_exhausted_error() {
        let err = Error::AllocationExhausted {
            service: "redis".to_string(),
            reason: "range 6380-6399 and extended range exhausted".to_string(),
        };
        let display = format!("{err}");
        assert!(display.contains("'redis'"));
        assert!(display.contains("6380-6399"));
    }

    #[test]
    fn test_port_range_error_conversion() {
        let range_err = crate::PortRange::from_bounds(5000, 4000).unwrap_err();
        let err: Error = range_err.into();
        assert!(format!("{err}").contains("5000-4000"));
    }

    #[test]
    fn test_unsupported_schema_version_error() {
        let err = Error::UnsupportedSchemaVersion {
            expected: 1,
            found: 2,
        };
        let display = format!("{err}");
        assert!(display.contains("expected 1"));
        assert!(display.contains("found 2"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(format!("{err}").contains("I/O error"));
        assert!(!err.is_contention());
    }
}
