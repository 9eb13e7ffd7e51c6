//! Error types used throughout the client

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the eStation client.
///
/// `Transport` and `Timeout` mean no HTTP response was obtained; they are the
/// only variants eligible for automatic retry. `HttpStatus` carries any
/// non-2xx, non-401 response verbatim. A 401 becomes
/// `AuthenticationRequired` after the stored credential has been purged.
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum EstationError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("HTTP error: status {code}")]
    HttpStatus { code: u16 },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session storage error: {0}")]
    Session(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Realtime channel error: {0}")]
    Realtime(String),
}

impl EstationError {
    /// Whether this failure happened before any HTTP response was produced.
    ///
    /// Only transport-level failures are retried; server responses (including
    /// 5xx) and authentication rejections are terminal.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, EstationError::Transport(_) | EstationError::Timeout { .. })
    }
}

/// Result type alias for eStation client operations
pub type Result<T> = std::result::Result<T, EstationError>;
