//! Error types for resync-core.
//!
//! # Failure classes
//!
//! Every [`Error`] is either transient or permanent (see [`Error::class`]).
//! The façade uses the class to decide what to do when a direct execution
//! fails:
//!
//! | Error | Class | Handling |
//! |-------|-------|----------|
//! | [`Error::Network`] | Transient | Queued, replayed on reconnect |
//! | [`Error::Timeout`] | Transient | Queued, replayed on reconnect |
//! | [`Error::Offline`] | Transient | Queued, replayed on reconnect |
//! | [`Error::Other`] | By message | Transient if it mentions network, fetch, connection or timeout |
//! | [`Error::Operation`] | Permanent | Returned to the caller |
//! | [`Error::Unauthorized`] | Permanent | Returned to the caller |
//! | [`Error::UnknownActionType`] | Permanent | Counts as a failed replay attempt |
//! | [`Error::Storage`] | Permanent | Logged; storage failures degrade rather than surface |
//! | [`Error::InvalidConfig`] | Permanent | Fix configuration and restart |

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the engine and by the operations it wraps.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The operation failed because of connectivity.
    #[error("Network error: {0}")]
    Network(String),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// The device is offline.
    #[error("Network is offline")]
    Offline,

    /// The operation was rejected for a reason retrying cannot fix.
    #[error("Operation failed: {0}")]
    Operation(String),

    /// Authentication or authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No handler is registered for a queued action type.
    #[error("No executor registered for action type '{0}'")]
    UnknownActionType(String),

    /// Persistence error from the storage layer.
    #[error("Storage error: {0}")]
    Storage(#[from] resync_store::Error),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Any other error raised by a wrapped operation.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Whether retrying a failed operation can succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Caused by connectivity; worth replaying later.
    Transient,
    /// Validation, auth or logic failure; never replayed.
    Permanent,
}

const NETWORK_HINTS: [&str; 4] = ["network", "fetch", "connection", "timeout"];

impl Error {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a permanent operation error.
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation(message.into())
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Wrap an arbitrary error.
    pub fn other<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Other(error.into())
    }

    /// Classify this error for the execute-or-queue decision.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Network(_) | Self::Timeout { .. } | Self::Offline => FailureClass::Transient,
            Self::Other(inner) => {
                let message = inner.to_string().to_lowercase();
                if NETWORK_HINTS.iter().any(|hint| message.contains(hint)) {
                    FailureClass::Transient
                } else {
                    FailureClass::Permanent
                }
            }
            _ => FailureClass::Permanent,
        }
    }

    /// Whether the failure was caused by connectivity.
    pub fn is_network_related(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut => Error::Network(err.to_string()),
            _ => Error::Other(Box::new(err)),
        }
    }
}

/// Result type alias using resync-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::network("socket closed");
        assert_eq!(err.to_string(), "Network error: socket closed");

        let err = Error::timeout("placeBet", Duration::from_secs(10));
        assert!(err.to_string().contains("placeBet"));
        assert!(err.to_string().contains("10s"));

        let err = Error::UnknownActionType("likePost".to_string());
        assert!(err.to_string().contains("likePost"));
    }

    #[test]
    fn test_transient_variants() {
        assert!(Error::network("x").is_network_related());
        assert!(Error::timeout("x", Duration::from_secs(1)).is_network_related());
        assert!(Error::Offline.is_network_related());
    }

    #[test]
    fn test_permanent_variants() {
        assert_eq!(Error::operation("bad amount").class(), FailureClass::Permanent);
        assert_eq!(
            Error::Unauthorized("expired".into()).class(),
            FailureClass::Permanent
        );
        assert_eq!(
            Error::UnknownActionType("x".into()).class(),
            FailureClass::Permanent
        );
    }

    #[test]
    fn test_other_classified_by_message() {
        assert!(Error::other("Failed to fetch").is_network_related());
        assert!(Error::other("Connection reset by peer").is_network_related());
        assert!(Error::other("request TIMEOUT").is_network_related());
        assert!(!Error::other("insufficient balance").is_network_related());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(matches!(err, Error::Network(_)));

        let err: Error = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad").into();
        assert_eq!(err.class(), FailureClass::Permanent);
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: Error = resync_store::Error::Poisoned.into();
        assert!(matches!(err, Error::Storage(_)));
        assert!(!err.is_network_related());
    }
}
