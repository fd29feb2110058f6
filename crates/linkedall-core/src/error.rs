//! Unified error type for the cache layer.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for the key-value client and the caching strategies.
///
/// Strategy entry points that promise a non-fatal contract (`get`, `set`,
/// `delete`, ...) convert these errors into defaults; the `try_*` variants
/// surface them unchanged.
#[derive(Error, Debug)]
pub enum CacheError {
    // ============ Transport Errors ============
    /// The store could not be reached or a pooled connection could not be obtained.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The client was explicitly closed and will not reconnect.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A command reached the store but failed.
    #[error("Command {command} failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },

    /// An operation exceeded its deadline.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // ============ Data Errors ============
    /// A value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ============ Collaborator Errors ============
    /// The system-of-record writer rejected a value.
    #[error("Writer failed for key '{key}': {message}")]
    Writer { key: String, message: String },

    // ============ Setup Errors ============
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CacheError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
            Self::Command { .. } => "COMMAND_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Writer { .. } => "WRITER_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a command error.
    #[must_use]
    pub fn command<T: Into<String>>(command: &'static str, message: T) -> Self {
        Self::Command {
            command,
            message: message.into(),
        }
    }

    /// Creates a writer error for a logical key.
    #[must_use]
    pub fn writer<K: Into<String>, T: ToString>(key: K, message: T) -> Self {
        Self::Writer {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks if this error is retriable at the transport level.
    ///
    /// Replies from the server (`WRONGTYPE`, `NOAUTH`, ...) are not.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CacheError::Connection("refused".to_string()).error_code(), "CONNECTION_ERROR");
        assert_eq!(CacheError::ConnectionClosed.error_code(), "CONNECTION_CLOSED");
        assert_eq!(CacheError::command("GET", "WRONGTYPE").error_code(), "COMMAND_ERROR");
        assert_eq!(CacheError::Timeout("slow".to_string()).error_code(), "TIMEOUT");
        assert_eq!(CacheError::writer("k", "db down").error_code(), "WRITER_ERROR");
        assert_eq!(CacheError::internal("oops").error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_retriable_errors() {
        assert!(CacheError::Connection("reset".to_string()).is_retriable());
        assert!(CacheError::Timeout("5s".to_string()).is_retriable());
    }

    #[test]
    fn test_non_retriable_errors() {
        assert!(!CacheError::ConnectionClosed.is_retriable());
        assert!(!CacheError::command("GET", "WRONGTYPE Operation against a key").is_retriable());
        assert!(!CacheError::command("AUTH", "NOAUTH Authentication required").is_retriable());
        assert!(!CacheError::Serialization("eof".to_string()).is_retriable());
        assert!(!CacheError::writer("k", "constraint").is_retriable());
        assert!(!CacheError::configuration("bad port").is_retriable());
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<u32>("not-json").unwrap_err();
        let cache_err = CacheError::from(err);
        assert!(matches!(cache_err, CacheError::Serialization(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CacheError::writer("product:42", "constraint violated");
        let msg = err.to_string();
        assert!(msg.contains("product:42") && msg.contains("constraint violated"));

        let err = CacheError::command("DEL", "NOAUTH");
        assert!(err.to_string().contains("DEL"));
    }
}
