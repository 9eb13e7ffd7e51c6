//! Realtime WebSocket client
//!
//! Maintains a best-effort persistent duplex connection to the realtime
//! endpoint: authenticates and subscribes on every successful (re)connect,
//! fans inbound frames out to listeners by kind, reconnects with a capped
//! linear ramp after unexpected loss, and never reconnects after an
//! intentional shutdown.

mod connection;
mod dispatch;

use std::sync::Arc;

use estation_domain::{
    ConnectionChange, ConnectionState, RealtimeConfig, ServiceUpdate, WorkspaceUpdate,
};
use tokio::sync::mpsc;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::session::SessionStore;
use connection::{Command, Shared};
pub use dispatch::{ChannelEvent, EventKey, Listener};

/// Client handle for the realtime channel.
///
/// All methods return immediately; the connection lives on a background
/// task that the handle communicates with over a command channel. Construct
/// inside a tokio runtime. A destroyed instance is terminal — build a fresh
/// one to reconnect after `destroy()`.
pub struct RealtimeClient {
    shared: Arc<Shared>,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl RealtimeClient {
    /// Create a client and spawn its connection task. No connection is
    /// attempted until [`connect`](Self::connect) is called.
    #[must_use]
    pub fn new(
        config: RealtimeConfig,
        session_key: impl Into<String>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new(config, session_key.into(), session));

        let instance = Uuid::new_v4();
        let task_shared = Arc::clone(&shared);
        tokio::spawn(
            connection::run(task_shared, cmd_rx)
                .instrument(tracing::debug_span!("realtime", instance = %instance)),
        );

        Self { shared, cmd_tx }
    }

    /// Begin connecting. No-op while already connecting or connected, and
    /// after `destroy()`. Also the manual resume path once the automatic
    /// reconnect attempts are exhausted.
    pub fn connect(&self) {
        if self.shared.is_destroyed() {
            warn!("connect() ignored: client destroyed");
            return;
        }
        match self.connection_state() {
            ConnectionState::Connecting | ConnectionState::Connected => {}
            ConnectionState::Disconnected | ConnectionState::Closing => {
                let _ = self.cmd_tx.send(Command::Connect);
            }
        }
    }

    /// Tear the client down: cancel any pending reconnect, close the
    /// transport with the graceful code, clear every listener. Terminal.
    pub fn destroy(&self) {
        if self.shared.is_destroyed() {
            return;
        }
        debug!("Destroying realtime client");
        self.shared.set_state(ConnectionState::Closing);
        self.shared.mark_destroyed();
        self.shared.registry.write().clear();
        let _ = self.cmd_tx.send(Command::Destroy);
    }

    /// Transmit a frame of the given kind. Only possible while connected;
    /// otherwise a logged no-op — never an error, never queued.
    pub fn send(&self, kind: &str, data: serde_json::Value) {
        if self.connection_state() != ConnectionState::Connected {
            warn!(kind = %kind, "Cannot send message, connection not open");
            return;
        }
        let _ = self.cmd_tx.send(Command::Send { kind: kind.to_string(), data });
    }

    /// Subscribe to additional channels.
    pub fn subscribe(&self, channels: &[&str]) {
        self.send("subscribe", serde_json::json!({ "channels": channels }));
    }

    /// Unsubscribe from channels.
    pub fn unsubscribe(&self, channels: &[&str]) {
        self.send("unsubscribe", serde_json::json!({ "channels": channels }));
    }

    /// Register a listener for an event kind. Registering the same handle
    /// twice for the same kind is one registration.
    pub fn on(&self, key: impl Into<EventKey>, listener: Listener) {
        self.shared.registry.write().add(key.into(), listener);
    }

    /// Remove a previously registered listener, matched by handle identity.
    pub fn off(&self, key: impl Into<EventKey>, listener: &Listener) {
        self.shared.registry.write().remove(&key.into(), listener);
    }

    /// Whether the channel is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Snapshot of the connection lifecycle state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Convenience: typed listener for service health updates. Returns the
    /// handle to pass to [`off`](Self::off).
    pub fn on_service_update(
        &self,
        f: impl Fn(&ServiceUpdate) + Send + Sync + 'static,
    ) -> Listener {
        let listener: Listener = Arc::new(move |event| {
            if let ChannelEvent::ServiceUpdate(update) = event {
                f(update);
            }
        });
        self.on(EventKey::ServiceUpdate, Arc::clone(&listener));
        listener
    }

    /// Convenience: typed listener for workspace mutations.
    pub fn on_workspace_update(
        &self,
        f: impl Fn(&WorkspaceUpdate) + Send + Sync + 'static,
    ) -> Listener {
        let listener: Listener = Arc::new(move |event| {
            if let ChannelEvent::WorkspaceUpdate(update) = event {
                f(update);
            }
        });
        self.on(EventKey::WorkspaceUpdate, Arc::clone(&listener));
        listener
    }

    /// Convenience: typed listener for connection transitions.
    pub fn on_connection_change(
        &self,
        f: impl Fn(&ConnectionChange) + Send + Sync + 'static,
    ) -> Listener {
        let listener: Listener = Arc::new(move |event| {
            if let ChannelEvent::Connection(change) = event {
                f(change);
            }
        });
        self.on(EventKey::Connection, Arc::clone(&listener));
        listener
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        // Best-effort shutdown signal; the task also exits once every
        // sender is gone.
        if !self.shared.is_destroyed() {
            let _ = self.cmd_tx.send(Command::Destroy);
        }
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("state", &self.connection_state())
            .field("destroyed", &self.shared.is_destroyed())
            .finish_non_exhaustive()
    }
}
