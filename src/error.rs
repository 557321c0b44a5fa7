//! Error types for quickfuture
//!
//! Errors raised inside the core never escape asynchronously. Anything that
//! goes wrong while settling a future (a handler throwing, a foreign `then`
//! failing, a chaining cycle) is converted into a rejection reason with
//! [`Error::into_reason`] and delivered through the future itself.

use crate::runtime::Value;
use std::fmt;
use thiserror::Error;

/// Main error type for quickfuture
#[derive(Error, Debug)]
pub enum Error {
    /// Structured runtime error (TypeError, chaining cycle, ...)
    #[error("{kind}: {message}")]
    RuntimeError { kind: ErrorKind, message: String },

    /// An arbitrary payload thrown by a user callback
    #[error("Uncaught {}", .0.to_js_string())]
    Thrown(Value),

    /// Invalid event loop configuration
    #[error("ConfigError: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IOError: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    /// Resource limit exceeded while driving the event loop
    #[error("ResourceLimitError: {kind}: {message}")]
    ResourceLimitError {
        kind: ResourceLimitKind,
        message: String,
    },
}

/// Resource limit kinds enforced by the event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLimitKind {
    /// Iteration count limit exceeded
    OperationLimit,
}

impl fmt::Display for ResourceLimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceLimitKind::OperationLimit => write!(f, "OperationLimit"),
        }
    }
}

/// Error kinds carried by structured error values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ErrorKind {
    /// TypeError - wrong type for operation
    TypeError,
    /// A handler returned the very future it was meant to settle.
    ///
    /// Displays as `TypeError` but stays distinguishable from other type errors.
    ChainingCycle,
    /// Generic Error - user-constructed error values
    GenericError,
    /// InternalError - internal engine error
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::TypeError | ErrorKind::ChainingCycle => write!(f, "TypeError"),
            ErrorKind::GenericError => write!(f, "Error"),
            ErrorKind::InternalError => write!(f, "InternalError"),
        }
    }
}

impl Error {
    /// Create a TypeError
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    /// Create the error raised when a future would be resolved with itself
    pub fn chaining_cycle() -> Self {
        Error::RuntimeError {
            kind: ErrorKind::ChainingCycle,
            message: messages::CHAINING_CYCLE.to_string(),
        }
    }

    /// Wrap an arbitrary value as a thrown error
    pub fn thrown(value: impl Into<Value>) -> Self {
        Error::Thrown(value.into())
    }

    /// Create an iteration limit exceeded error
    pub fn operation_limit_exceeded(iterations: u64, limit: u64) -> Self {
        Error::ResourceLimitError {
            kind: ResourceLimitKind::OperationLimit,
            message: format!(
                "Event loop iteration limit exceeded: {} iterations run, limit was {}",
                iterations, limit
            ),
        }
    }

    /// The structured kind of this error, if it has one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::RuntimeError { kind, .. } => Some(*kind),
            Error::Thrown(value) => value.error_kind(),
            _ => None,
        }
    }

    /// Convert the error into the payload a future is rejected with.
    ///
    /// Thrown payloads pass through unchanged; everything else becomes an
    /// error object carrying the kind and message.
    pub fn into_reason(self) -> Value {
        match self {
            Error::Thrown(value) => value,
            Error::RuntimeError { kind, message } => Value::new_error(kind, &message),
            other => Value::new_error(ErrorKind::InternalError, &other.to_string()),
        }
    }
}

/// Result type alias for quickfuture
pub type Result<T> = std::result::Result<T, Error>;

/// Standardized error message templates
pub mod messages {
    pub const CHAINING_CYCLE: &str = "Chaining cycle detected for future";
    pub const NOT_A_FUNCTION: &str = "is not a function";
    pub const NOT_AN_ARRAY: &str = "is not an array";

    /// Format a "X is not a function" error message
    pub fn not_a_function(name: &str) -> String {
        format!("'{}' {}", name, NOT_A_FUNCTION)
    }

    /// Format the error message for a combinator given non-sequence input
    pub fn combinator_requires_array(combinator: &str, got: &str) -> String {
        format!("Future.{} argument ({}) {}", combinator, got, NOT_AN_ARRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chaining_cycle_displays_as_type_error() {
        let err = Error::chaining_cycle();
        assert_eq!(
            err.to_string(),
            "TypeError: Chaining cycle detected for future"
        );
        assert_eq!(err.kind(), Some(ErrorKind::ChainingCycle));
    }

    #[test]
    fn test_thrown_payload_passes_through() {
        let reason = Error::thrown("boom").into_reason();
        assert_eq!(reason.as_str(), Some("boom"));
    }

    #[test]
    fn test_runtime_error_becomes_error_value() {
        let reason = Error::type_error("bad input").into_reason();
        assert_eq!(reason.error_kind(), Some(ErrorKind::TypeError));
        assert_eq!(
            reason.get_property("message").and_then(|m| m.as_str().map(String::from)),
            Some("bad input".to_string())
        );
    }

    #[test]
    fn test_config_error_becomes_internal_error_value() {
        let reason = Error::ConfigError("nope".to_string()).into_reason();
        assert_eq!(reason.error_kind(), Some(ErrorKind::InternalError));
    }

    #[test]
    fn test_combinator_message() {
        assert_eq!(
            messages::combinator_requires_array("all", "number"),
            "Future.all argument (number) is not an array"
        );
    }
}
