//! Realtime wire frame and connection state types

use serde::{Deserialize, Serialize};

/// JSON text frame exchanged in both directions on the realtime channel.
///
/// `kind` determines how `data` must be interpreted; unknown kinds are
/// dispatched generically rather than dropped. The timestamp is an ISO-8601
/// string carried verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: String,
}

/// Lifecycle state of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl ConnectionState {
    /// Atomic-friendly encoding for lock-free state snapshots.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Closing => 3,
        }
    }

    /// Inverse of [`as_u8`](Self::as_u8); out-of-range values read as
    /// `Disconnected`.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Status carried by a `connection` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

/// Payload delivered to `connection` listeners on every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionChange {
    pub status: ConnectionStatus,
    /// Close code, present for `disconnected` notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Human-readable detail, present for `error` notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ConnectionChange {
    #[must_use]
    pub fn connected() -> Self {
        Self { status: ConnectionStatus::Connected, code: None, detail: None }
    }

    #[must_use]
    pub fn disconnected(code: Option<u16>) -> Self {
        Self { status: ConnectionStatus::Disconnected, code, detail: None }
    }

    #[must_use]
    pub fn error(detail: impl Into<String>) -> Self {
        Self { status: ConnectionStatus::Error, code: None, detail: Some(detail.into()) }
    }
}
