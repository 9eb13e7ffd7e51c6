//! Tracing bootstrap
//!
//! Diagnostic logging is opt-in and strictly non-functional: nothing in the
//! client changes behavior based on whether a subscriber is installed.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a global `tracing` subscriber. Idempotent; later calls are
/// no-ops, as is this one when the host application already installed a
/// subscriber of its own.
///
/// `RUST_LOG` wins when set; otherwise `debug` widens the default filter to
/// include the client's debug-level diagnostics.
pub fn init(debug: bool) {
    INIT.call_once(|| {
        let default_filter = if debug { "info,estation=debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}
