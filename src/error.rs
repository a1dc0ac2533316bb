//! Error types for Weft
//!
//! This module defines all error types used throughout the client,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Weft operations
///
/// This enum encompasses all possible errors that can occur while talking
/// to the backend, decoding stream frames, loading configuration, or
/// persisting client-local preferences.
#[derive(Error, Debug)]
pub enum WeftError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend returned a non-success status
    #[error("Backend error: {0}")]
    Api(String),

    /// Backend returned 404 for a chat, message, or character
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport-level failure while reading a generation stream
    #[error("Stream error: {0}")]
    Stream(String),

    /// Operation rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Client-local preference storage errors
    #[error("Preferences error: {0}")]
    Prefs(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl WeftError {
    /// Returns true if this error represents a backend 404
    ///
    /// Not-found is eventual-consistency cleanup, not a failure: callers
    /// evict the stale id and fall back to the next available chat.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WeftError::NotFound(_))
    }
}

/// Result type alias for Weft operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Returns true if an `anyhow` error wraps a backend 404
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<WeftError>()
        .map(WeftError::is_not_found)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = WeftError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_api_error_display() {
        let error = WeftError::Api("HTTP 500: boom".to_string());
        assert_eq!(error.to_string(), "Backend error: HTTP 500: boom");
    }

    #[test]
    fn test_not_found_display() {
        let error = WeftError::NotFound("chat c1".to_string());
        assert_eq!(error.to_string(), "Not found: chat c1");
    }

    #[test]
    fn test_stream_error_display() {
        let error = WeftError::Stream("connection reset".to_string());
        assert_eq!(error.to_string(), "Stream error: connection reset");
    }

    #[test]
    fn test_validation_error_display() {
        let error = WeftError::Validation("empty message".to_string());
        assert_eq!(error.to_string(), "Validation error: empty message");
    }

    #[test]
    fn test_is_not_found() {
        assert!(WeftError::NotFound("x".to_string()).is_not_found());
        assert!(!WeftError::Api("x".to_string()).is_not_found());
    }

    #[test]
    fn test_anyhow_is_not_found() {
        let err: anyhow::Error = WeftError::NotFound("chat".to_string()).into();
        assert!(is_not_found(&err));

        let err: anyhow::Error = WeftError::Api("boom".to_string()).into();
        assert!(!is_not_found(&err));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: WeftError = io_error.into();
        assert!(matches!(error, WeftError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let error: WeftError = json_error.into();
        assert!(matches!(error, WeftError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: WeftError = yaml_error.into();
        assert!(matches!(error, WeftError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WeftError>();
    }
}
