//! Configuration loader
//!
//! Loads client configuration from environment variables.
//!
//! ## Environment Variables
//! - `ESTATION_API_URL`: HTTP API base URL
//! - `ESTATION_API_DIRECT_URL`: direct backend URL (bypasses the gateway)
//! - `ESTATION_WS_URL`: realtime WebSocket endpoint URL
//! - `ESTATION_API_TIMEOUT_MS`: per-attempt request timeout in milliseconds
//! - `ESTATION_API_RETRY_ATTEMPTS`: total attempts per logical request
//! - `ESTATION_SESSION_STORAGE_KEY`: key the session credential is stored under
//! - `ESTATION_DEBUG`: verbose diagnostic logging (true/false)
//!
//! Every variable has a documented default; absence of any variable never
//! fails startup. A variable that is present but malformed falls back to its
//! default with a warning.

use std::time::Duration;

use estation_domain::{EstationConfig, Result};
use tracing::warn;

/// Load client configuration from the environment.
///
/// Unset variables take their documented defaults, so this cannot fail on a
/// bare environment. The `Result` return is kept for parity with file-backed
/// loaders.
pub fn load() -> Result<EstationConfig> {
    Ok(load_from_env())
}

/// Load client configuration from environment variables, applying defaults
/// for anything unset or malformed.
#[must_use]
pub fn load_from_env() -> EstationConfig {
    let mut config = EstationConfig::default();

    if let Ok(url) = std::env::var("ESTATION_API_URL") {
        config.api.base_url = url;
    }
    if let Ok(url) = std::env::var("ESTATION_API_DIRECT_URL") {
        config.api.direct_url = url;
    }
    if let Ok(url) = std::env::var("ESTATION_WS_URL") {
        config.realtime.url = url;
    }
    if let Some(timeout_ms) = env_u64("ESTATION_API_TIMEOUT_MS") {
        config.api.request_timeout = Duration::from_millis(timeout_ms);
    }
    if let Some(attempts) = env_u32("ESTATION_API_RETRY_ATTEMPTS") {
        config.api.retry_attempts = attempts;
    }
    if let Ok(key) = std::env::var("ESTATION_SESSION_STORAGE_KEY") {
        config.session.storage_key = key;
    }
    config.debug = env_bool("ESTATION_DEBUG", config.debug);

    config
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<u64>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(var = %name, value = %raw, error = %e, "Ignoring malformed numeric variable");
            None
        }
    }
}

fn env_u32(name: &str) -> Option<u32> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<u32>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(var = %name, value = %raw, error = %e, "Ignoring malformed numeric variable");
            None
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(value.to_lowercase().as_str(), "true" | "1" | "yes"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests share process state; keep each test on its own keys.

    #[test]
    fn bare_environment_yields_defaults() {
        let config = load_from_env();
        assert_eq!(config.api.retry_attempts, 3);
        assert_eq!(config.api.request_timeout, Duration::from_secs(30));
        assert_eq!(config.session.storage_key, "estation_session");
    }

    #[test]
    fn ws_url_override_is_applied() {
        std::env::set_var("ESTATION_WS_URL", "wss://ops.example.org/ws");
        let config = load_from_env();
        assert_eq!(config.realtime.url, "wss://ops.example.org/ws");
        std::env::remove_var("ESTATION_WS_URL");
    }

    #[test]
    fn env_bool_recognizes_truthy_values() {
        std::env::set_var("ESTATION_TEST_FLAG", "TRUE");
        assert!(env_bool("ESTATION_TEST_FLAG", false));
        std::env::set_var("ESTATION_TEST_FLAG", "0");
        assert!(!env_bool("ESTATION_TEST_FLAG", true));
        std::env::remove_var("ESTATION_TEST_FLAG");
        assert!(env_bool("ESTATION_TEST_FLAG", true));
    }

    #[test]
    fn malformed_numeric_falls_back() {
        std::env::set_var("ESTATION_TEST_TIMEOUT", "not-a-number");
        assert_eq!(env_u64("ESTATION_TEST_TIMEOUT"), None);
        std::env::set_var("ESTATION_TEST_TIMEOUT", "1500");
        assert_eq!(env_u64("ESTATION_TEST_TIMEOUT"), Some(1500));
        std::env::remove_var("ESTATION_TEST_TIMEOUT");
    }
}
