//! Unified error types for Grasp.
//!
//! Errors fall into two groups. Caller errors (`NotFound`, `InvalidInput`)
//! are always surfaced because acting on a wrong id corrupts state.
//! Infrastructure errors are recovered locally where the workflow allows it:
//! hooks fail open, question generation falls back to a heuristic, and
//! malformed persisted records are treated as absent.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of record a lookup failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Task,
    Chunk,
    Check,
    DesignReview,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Task => "task",
            Self::Chunk => "chunk",
            Self::Check => "check",
            Self::DesignReview => "design review",
        };
        f.write_str(name)
    }
}

/// The main error type for Grasp operations.
#[derive(Error, Debug)]
pub enum GraspError {
    /// I/O errors from store or config files.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Unknown task, chunk, check or design review id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    /// Missing or invalid caller input.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// Failure of an external text generator.
    #[error("external service failure: {message}")]
    ExternalService { message: String },

    /// A persisted record that could not be decoded.
    #[error("malformed persisted data: {message}")]
    MalformedData { message: String },
}

/// A specialized Result type for Grasp operations.
pub type Result<T> = std::result::Result<T, GraspError>;

impl GraspError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a not-found error for the given record kind.
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an external service error.
    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalService {
            message: message.into(),
        }
    }

    /// Create a malformed data error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedData {
            message: message.into(),
        }
    }

    /// Whether this error must be reported back to the caller.
    ///
    /// Caller errors abort the operation. Everything else is an
    /// infrastructure failure that hook paths may swallow.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidInput { .. })
    }
}

impl From<io::Error> for GraspError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for GraspError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling.
///
/// Logs the error and substitutes a safe value instead of propagating.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Exit codes for the Grasp CLI.
pub mod exit_codes {
    /// Success. Hooks always exit with this; denials travel in the JSON body.
    pub const APPROVE: i32 = 0;

    /// A command failed (unknown id, invalid input).
    pub const ERROR: i32 = 1;

    /// Crash (the host treats this as a non-blocking error).
    pub const CRASH: i32 = 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = GraspError::storage(
            "/tmp/test.json",
            io::Error::new(io::ErrorKind::NotFound, "file not found"),
        );
        assert!(err.to_string().contains("storage error"));
        assert!(err.to_string().contains("/tmp/test.json"));
    }

    #[test]
    fn test_not_found_error_display() {
        let err = GraspError::not_found(RecordKind::DesignReview, "01J0");
        assert_eq!(err.to_string(), "design review not found: 01J0");

        let err = GraspError::not_found(RecordKind::Task, "abc");
        assert_eq!(err.to_string(), "task not found: abc");
    }

    #[test]
    fn test_invalid_input_error_display() {
        let err = GraspError::invalid_input("answer is required");
        assert_eq!(err.to_string(), "invalid input: answer is required");
    }

    #[test]
    fn test_serde_error_display() {
        let err = GraspError::serde("invalid JSON");
        assert_eq!(err.to_string(), "serialization error: invalid JSON");
    }

    #[test]
    fn test_external_error_display() {
        let err = GraspError::external("generator exited with status 1");
        assert!(err.to_string().starts_with("external service failure"));
    }

    #[test]
    fn test_caller_errors() {
        assert!(GraspError::not_found(RecordKind::Check, "x").is_caller_error());
        assert!(GraspError::invalid_input("x").is_caller_error());
        assert!(!GraspError::config("x").is_caller_error());
        assert!(!GraspError::external("x").is_caller_error());
        assert!(!GraspError::malformed("x").is_caller_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: GraspError = io_err.into();
        assert!(matches!(err, GraspError::Storage { .. }));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: GraspError = json_err.into();
        assert!(matches!(err, GraspError::Serde { .. }));
    }

    #[test]
    fn test_fail_open_default() {
        let result: Result<Vec<String>> = Err(GraspError::config("test"));
        let value = result.fail_open_default("test context");
        assert!(value.is_empty());
    }

    #[test]
    fn test_fail_open_with() {
        let result: Result<i32> = Err(GraspError::external("test"));
        assert_eq!(result.fail_open_with("test context", 42), 42);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_codes::APPROVE, 0);
        assert_eq!(exit_codes::ERROR, 1);
        assert_eq!(exit_codes::CRASH, 3);
    }
}
