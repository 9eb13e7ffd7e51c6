//! Client constants
//!
//! Centralized location for the documented defaults of the configuration
//! surface and the realtime protocol.

// HTTP client defaults
pub const DEFAULT_API_BASE_URL: &str = "https://localhost/api";
pub const DEFAULT_API_DIRECT_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1_000;

// Realtime client defaults
pub const DEFAULT_WS_URL: &str = "wss://localhost/ws";
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 30_000;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Close code used for intentional shutdown; suppresses auto-reconnect.
pub const GRACEFUL_CLOSE_CODE: u16 = 1000;

/// Channels subscribed immediately after every successful (re)connect.
pub const DEFAULT_CHANNELS: [&str; 2] = ["services", "workspaces"];

// Session storage
pub const DEFAULT_SESSION_STORAGE_KEY: &str = "estation_session";

// Wire frame kinds the client emits
pub const FRAME_AUTH: &str = "auth";
pub const FRAME_SUBSCRIBE: &str = "subscribe";
pub const FRAME_UNSUBSCRIBE: &str = "unsubscribe";
pub const FRAME_HEARTBEAT_RESPONSE: &str = "heartbeat_response";

// Wire frame kinds the client recognizes
pub const FRAME_SERVICE_UPDATE: &str = "service_update";
pub const FRAME_WORKSPACE_UPDATE: &str = "workspace_update";
pub const FRAME_AUTH_RESPONSE: &str = "auth_response";
pub const FRAME_ERROR: &str = "error";
pub const FRAME_HEARTBEAT: &str = "heartbeat";
