//! Error types for courtsync
//!
//! One enum covers every failure the synchronization layer can hand back to a
//! caller. Network-facing variants are returned as structured values so UI
//! collaborators can render them inline; nothing here is meant to be thrown
//! past the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for courtsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// A single field-level validation failure reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Error taxonomy for the synchronization layer
#[derive(Error, Debug)]
pub enum SyncError {
    /// The request never reached the server (DNS, refused, reset)
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The request exceeded its per-request deadline
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Structured 4xx/5xx payload from the server
    #[error("Server error ({status}): {error}")]
    Server {
        status: u16,
        error: String,
        details: Option<serde_json::Value>,
    },

    /// 4xx carrying field-level errors
    #[error("Validation failed ({status}): {error}")]
    Validation {
        status: u16,
        error: String,
        fields: Vec<FieldError>,
    },

    /// 401 survived one refresh+retry cycle, or the refresh itself failed
    #[error("Session expired, please sign in again")]
    AuthExpired,

    /// Corrupt persisted cache entry
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Non-clean socket close or handshake timeout
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Persistent cache tier failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Whether a later attempt of the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Connectivity(_) | SyncError::Timeout(_) | SyncError::WebSocket(_) => true,
            SyncError::Server { status, .. } => matches!(status, 429 | 500..=599),
            _ => false,
        }
    }

    /// HTTP status attached to the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Server { status, .. } | SyncError::Validation { status, .. } => {
                Some(*status)
            }
            SyncError::AuthExpired => Some(401),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SyncError::Serialization(e.to_string())
        } else {
            SyncError::Connectivity(e.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::WebSocket(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = SyncError::Server {
            status: 503,
            error: "Service unavailable".to_string(),
            details: None,
        };
        assert_eq!(err.to_string(), "Server error (503): Service unavailable");

        let err = SyncError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn test_retry_classification() {
        assert!(SyncError::Connectivity("refused".into()).is_retryable());
        assert!(SyncError::Server {
            status: 502,
            error: "bad gateway".into(),
            details: None
        }
        .is_retryable());
        assert!(!SyncError::Server {
            status: 404,
            error: "not found".into(),
            details: None
        }
        .is_retryable());
        assert!(!SyncError::AuthExpired.is_retryable());
        assert!(!SyncError::Validation {
            status: 422,
            error: "invalid".into(),
            fields: vec![]
        }
        .is_retryable());
    }

    #[test]
    fn test_status() {
        assert_eq!(SyncError::AuthExpired.status(), Some(401));
        assert_eq!(SyncError::Connectivity("x".into()).status(), None);
    }
}
