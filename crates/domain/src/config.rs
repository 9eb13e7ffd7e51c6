//! Configuration structures
//!
//! All fields carry documented defaults; a config built with `Default` is
//! fully usable without any environment present. Values are fixed at client
//! construction and not runtime-mutable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Direct backend URL, bypassing the gateway (development aid).
    pub direct_url: String,
    /// Hard per-attempt timeout; exceeding it aborts the in-flight request.
    pub request_timeout: Duration,
    /// Total attempts per logical request (initial try + retries).
    pub retry_attempts: u32,
    /// Backoff unit: the wait before attempt `n + 1` is `retry_backoff * n`.
    pub retry_backoff: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_API_BASE_URL.to_string(),
            direct_url: constants::DEFAULT_API_DIRECT_URL.to_string(),
            request_timeout: Duration::from_millis(constants::DEFAULT_REQUEST_TIMEOUT_MS),
            retry_attempts: constants::DEFAULT_RETRY_ATTEMPTS,
            retry_backoff: Duration::from_millis(constants::DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

/// Realtime channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Reconnect ramp unit: delay before attempt `n` is
    /// `min(reconnect_interval * n, max_reconnect_delay)`.
    pub reconnect_interval: Duration,
    /// Cap on the reconnect delay.
    pub max_reconnect_delay: Duration,
    /// Automatic reconnect attempts before parking until a manual `connect()`.
    pub max_reconnect_attempts: u32,
    /// Channels subscribed immediately after every successful (re)connect.
    pub default_channels: Vec<String>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: constants::DEFAULT_WS_URL.to_string(),
            reconnect_interval: Duration::from_millis(constants::DEFAULT_RECONNECT_INTERVAL_MS),
            max_reconnect_delay: Duration::from_millis(constants::DEFAULT_MAX_RECONNECT_DELAY_MS),
            max_reconnect_attempts: constants::DEFAULT_MAX_RECONNECT_ATTEMPTS,
            default_channels: constants::DEFAULT_CHANNELS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Session credential storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Key the bearer token is stored under.
    pub storage_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { storage_key: constants::DEFAULT_SESSION_STORAGE_KEY.to_string() }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstationConfig {
    pub api: ApiConfig,
    pub realtime: RealtimeConfig,
    pub session: SessionConfig,
    /// Enables verbose diagnostic logging; never affects control flow.
    pub debug: bool,
}
