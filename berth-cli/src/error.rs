//! CLI-specific error types with exit codes.
//!
//! Library errors are wrapped; partial allocation failures are not errors
//! at this layer and never reach here.

use std::fmt;

use berth::Error as LibError;

/// CLI-specific error type with exit code mapping.
#[derive(Debug)]
pub enum CliError {
    /// Library error (wrapped).
    Library(LibError),

    /// Invalid command-line arguments.
    InvalidArguments(String),

    /// I/O error.
    Io(std::io::Error),

    /// Timeout waiting for the store lock.
    Timeout,

    /// Configuration error.
    Config(String),

    /// Nothing to act on (e.g. no allocations for the project).
    NotFound(String),

    /// `docker compose` could not be run or failed.
    Compose(String),
}

impl CliError {
    /// Get the appropriate exit code for this error.
    ///
    /// Exit codes:
    /// - 0: Success, including partially failed allocations
    /// - 1: Nothing found to act on
    /// - 2: Timeout waiting for the store lock
    /// - 4: Invalid arguments
    /// - 5: I/O error
    /// - 6: Other library error
    /// - 7: Configuration error
    /// - 8: `docker compose` failure
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound(_) => 1,
            CliError::Library(lib_err) => match lib_err {
                LibError::NotFound { .. } | LibError::UnknownTemplate { .. } => 1,
                LibError::Validation { .. }
                | LibError::InvalidPort { .. }
                | LibError::InvalidPortRange { .. } => 4,
                LibError::Configuration(_) => 7,
                _ => 6,
            },
            CliError::Timeout => 2,
            CliError::InvalidArguments(_) => 4,
            CliError::Io(_) => 5,
            CliError::Config(_) => 7,
            CliError::Compose(_) => 8,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Library(e) => write!(f, "{e}"),
            CliError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
            CliError::Timeout => write!(f, "Timeout waiting for the allocations store lock"),
            CliError::Config(msg) => write!(f, "Configuration error: {msg}"),
            CliError::NotFound(msg) => write!(f, "{msg}"),
            CliError::Compose(msg) => write!(f, "docker compose: {msg}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Library(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LibError> for CliError {
    fn from(e: LibError) -> Self {
        if matches!(e, LibError::LockTimeout { .. }) {
            CliError::Timeout
        } else {
            CliError::Library(e)
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<csv::Error> for CliError {
    fn from(e: csv::Error) -> Self {
        CliError::Io(std::io::Error::other(e))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Io(std::io::Error::other(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Timeout.exit_code(), 2);
        assert_eq!(CliError::InvalidArguments("x".into()).exit_code(), 4);
        assert_eq!(CliError::Compose("missing".into()).exit_code(), 8);
        let unknown = CliError::from(LibError::UnknownTemplate {
            name: "nope".into(),
        });
        assert_eq!(unknown.exit_code(), 1);
    }

    #[test]
    fn test_lock_timeout_maps_to_timeout() {
        let err = CliError::from(LibError::LockTimeout { seconds: 5 });
        assert!(matches!(err, CliError::Timeout));
    }
}
