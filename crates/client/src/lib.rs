//! # eStation Client
//!
//! Typed endpoint surface for the eStation dashboard backend, layered over
//! the resilient HTTP client and the realtime channel from
//! `estation-infra`.
//!
//! ```no_run
//! use estation_client::EstationClient;
//!
//! # async fn example() -> estation_domain::Result<()> {
//! let client = EstationClient::from_env()?;
//! let services = client.service_status().await?;
//! println!("{} services monitored", services.len());
//!
//! let realtime = client.realtime();
//! realtime.on_service_update(|update| {
//!     println!("{} is now {:?}", update.service_name, update.status);
//! });
//! realtime.connect();
//! # Ok(())
//! # }
//! ```

pub mod telemetry;

mod api;

pub use api::{ApiUrls, EstationClient};

// Re-export the building blocks consumers commonly need alongside the client
pub use estation_domain::{EstationConfig, EstationError, Result};
pub use estation_infra::{
    ChannelEvent, EventKey, KeychainSessionStore, Listener, MemorySessionStore, RealtimeClient,
    SessionStore,
};

use once_cell::sync::OnceCell;

static GLOBAL: OnceCell<EstationClient> = OnceCell::new();

/// Process-wide client, constructed lazily from the environment on first
/// access.
///
/// The lifetime is injectable: call [`global_init`] before the first
/// `global()` to supply a custom-built instance, and prefer fresh
/// per-test instances over this accessor in test code.
pub fn global() -> Result<&'static EstationClient> {
    GLOBAL.get_or_try_init(EstationClient::from_env)
}

/// Install a specific client as the process-wide instance.
///
/// Fails with the rejected instance if one was already installed.
pub fn global_init(client: EstationClient) -> std::result::Result<(), EstationClient> {
    GLOBAL.set(client)
}
