//! Realtime connection task
//!
//! A background task owns the WebSocket stream for the lifetime of the
//! client instance. Public calls communicate with it over a command channel
//! and return immediately; inbound frames are dispatched from the task in
//! arrival order, so no two dispatches for the same instance ever run
//! concurrently.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use estation_domain::constants::{
    FRAME_AUTH, FRAME_AUTH_RESPONSE, FRAME_ERROR, FRAME_HEARTBEAT, FRAME_HEARTBEAT_RESPONSE,
    FRAME_SERVICE_UPDATE, FRAME_SUBSCRIBE, FRAME_WORKSPACE_UPDATE, GRACEFUL_CLOSE_CODE,
};
use estation_domain::{
    ConnectionChange, ConnectionState, Frame, RealtimeConfig, ServiceUpdate, WorkspaceUpdate,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::realtime::dispatch::{self, ChannelEvent, ListenerRegistry};
use crate::session::SessionStore;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands sent from the public handle to the connection task.
pub(crate) enum Command {
    /// Begin a connect cycle (manual resume included).
    Connect,
    /// Transmit a frame; dropped with a warning when not connected.
    Send { kind: String, data: serde_json::Value },
    /// Tear down: close gracefully, cancel timers, stop for good.
    Destroy,
}

/// State shared between the public handle and the connection task.
pub(crate) struct Shared {
    pub config: RealtimeConfig,
    pub session_key: String,
    pub session: Arc<dyn SessionStore>,
    pub registry: RwLock<ListenerRegistry>,
    state: AtomicU8,
    destroyed: AtomicBool,
}

impl Shared {
    pub fn new(
        config: RealtimeConfig,
        session_key: String,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            session_key,
            session,
            registry: RwLock::new(ListenerRegistry::default()),
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    /// Deliver an event to registered listeners. Silent after destroy.
    ///
    /// The listener set is snapshotted before invocation so callbacks can
    /// register or remove listeners without deadlocking on the registry.
    pub fn emit(&self, event: &ChannelEvent) {
        if self.is_destroyed() {
            return;
        }
        let listeners = self.registry.read().snapshot(&event.key());
        dispatch::deliver(&listeners, event);
    }

    /// Read the session credential fresh; never cached across calls.
    pub fn token(&self) -> Option<String> {
        match self.session.get(&self.session_key) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Session store read failed; connecting unauthenticated");
                None
            }
        }
    }
}

/// Delay before reconnect attempt `attempt` (1-based): a linear ramp on the
/// base interval, capped.
pub(crate) fn reconnect_delay(config: &RealtimeConfig, attempt: u32) -> Duration {
    config.reconnect_interval.saturating_mul(attempt).min(config.max_reconnect_delay)
}

/// Why the connected phase ended.
enum Drive {
    /// `destroy()` was issued.
    Destroyed,
    /// Every handle was dropped.
    HandleDropped,
    /// The peer closed the connection (close frame or EOF).
    Closed(Option<u16>),
    /// A transport error killed the connection.
    Failed(String),
}

/// How a reconnect wait ended.
enum Wait {
    Elapsed,
    Destroyed,
    HandleDropped,
}

/// The connection task. Runs until destroy or until every handle is gone.
pub(crate) async fn run(shared: Arc<Shared>, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
    let mut attempts: u32 = 0;

    'parked: loop {
        // Disconnected and idle: only an explicit connect starts a cycle.
        loop {
            match cmd_rx.recv().await {
                None => return,
                Some(Command::Destroy) => {
                    teardown(&shared);
                    return;
                }
                Some(Command::Connect) => break,
                Some(Command::Send { kind, .. }) => {
                    warn!(kind = %kind, "Cannot send message, connection not open");
                }
            }
        }

        // Connect / reconnect cycle.
        loop {
            if shared.is_destroyed() {
                teardown(&shared);
                return;
            }

            shared.set_state(ConnectionState::Connecting);
            debug!(url = %shared.config.url, "Connecting realtime channel");

            match connect_async(shared.config.url.as_str()).await {
                Ok((mut ws, _response)) => {
                    if shared.is_destroyed() {
                        close_graceful(&mut ws).await;
                        teardown(&shared);
                        return;
                    }
                    attempts = 0;
                    shared.set_state(ConnectionState::Connected);
                    debug!("Realtime channel connected");
                    shared.emit(&ChannelEvent::Connection(ConnectionChange::connected()));

                    let outcome = match announce(&mut ws, &shared).await {
                        Ok(()) => drive(&mut ws, &mut cmd_rx, &shared).await,
                        Err(detail) => Drive::Failed(detail),
                    };

                    match outcome {
                        Drive::Destroyed => {
                            close_graceful(&mut ws).await;
                            teardown(&shared);
                            return;
                        }
                        Drive::HandleDropped => {
                            close_graceful(&mut ws).await;
                            shared.set_state(ConnectionState::Disconnected);
                            return;
                        }
                        Drive::Closed(code) => {
                            shared.set_state(ConnectionState::Disconnected);
                            debug!(?code, "Realtime channel closed");
                            shared
                                .emit(&ChannelEvent::Connection(ConnectionChange::disconnected(code)));
                            if code == Some(GRACEFUL_CLOSE_CODE) {
                                // Graceful close suppresses auto-reconnect.
                                continue 'parked;
                            }
                        }
                        Drive::Failed(detail) => {
                            shared.set_state(ConnectionState::Disconnected);
                            warn!(error = %detail, "Realtime channel failed");
                            shared.emit(&ChannelEvent::Connection(ConnectionChange::error(detail)));
                            shared
                                .emit(&ChannelEvent::Connection(ConnectionChange::disconnected(None)));
                        }
                    }
                }
                Err(e) => {
                    shared.set_state(ConnectionState::Disconnected);
                    warn!(error = %e, "Realtime connection attempt failed");
                    shared.emit(&ChannelEvent::Connection(ConnectionChange::error(e.to_string())));
                }
            }

            if shared.is_destroyed() {
                teardown(&shared);
                return;
            }
            if attempts >= shared.config.max_reconnect_attempts {
                warn!(
                    attempts,
                    "Max reconnection attempts reached; waiting for a manual connect"
                );
                continue 'parked;
            }
            attempts += 1;
            let delay = reconnect_delay(&shared.config, attempts);
            debug!(attempt = attempts, ?delay, "Scheduling reconnect");

            match wait_reconnect(&mut cmd_rx, delay).await {
                Wait::Elapsed => {}
                Wait::Destroyed => {
                    teardown(&shared);
                    return;
                }
                Wait::HandleDropped => return,
            }
        }
    }
}

/// Connected phase: multiplex commands and inbound frames until the
/// connection ends one way or another.
async fn drive(
    ws: &mut WsStream,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    shared: &Shared,
) -> Drive {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                None => return Drive::HandleDropped,
                Some(Command::Destroy) => return Drive::Destroyed,
                Some(Command::Connect) => {} // already connected
                Some(Command::Send { kind, data }) => {
                    if let Err(detail) = send_frame(ws, &kind, data).await {
                        return Drive::Failed(detail);
                    }
                }
            },
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Err(detail) = handle_text(ws, text.as_str(), shared).await {
                        return Drive::Failed(detail);
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if ws.send(Message::Pong(payload)).await.is_err() {
                        return Drive::Failed("Failed to answer ping".to_string());
                    }
                }
                Some(Ok(Message::Close(close))) => {
                    return Drive::Closed(close.map(|c| u16::from(c.code)));
                }
                Some(Ok(_)) => {} // binary/pong frames are not part of the protocol
                Some(Err(e)) => return Drive::Failed(e.to_string()),
                None => return Drive::Closed(None),
            }
        }
    }
}

/// Post-open handshake: authenticate with the current credential, if any,
/// then subscribe to the default channel set.
async fn announce(ws: &mut WsStream, shared: &Shared) -> Result<(), String> {
    if let Some(token) = shared.token() {
        send_frame(ws, FRAME_AUTH, json!({ "token": token })).await?;
    }
    send_frame(ws, FRAME_SUBSCRIBE, json!({ "channels": shared.config.default_channels })).await
}

/// Classify and dispatch one inbound text frame.
///
/// A malformed frame is logged and dropped; it never terminates the
/// connection. Only a failed `heartbeat_response` write is fatal, because
/// that is a transport failure.
async fn handle_text(ws: &mut WsStream, text: &str, shared: &Shared) -> Result<(), String> {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Failed to parse realtime frame; dropping");
            return Ok(());
        }
    };

    match frame.kind.as_str() {
        FRAME_HEARTBEAT => {
            // Liveness probe: answered immediately, transparent to consumers.
            send_frame(ws, FRAME_HEARTBEAT_RESPONSE, json!({})).await?;
        }
        FRAME_SERVICE_UPDATE => match serde_json::from_value::<ServiceUpdate>(frame.data) {
            Ok(update) => shared.emit(&ChannelEvent::ServiceUpdate(update)),
            Err(e) => warn!(error = %e, "Malformed service_update payload; dropping"),
        },
        FRAME_WORKSPACE_UPDATE => match serde_json::from_value::<WorkspaceUpdate>(frame.data) {
            Ok(update) => shared.emit(&ChannelEvent::WorkspaceUpdate(update)),
            Err(e) => warn!(error = %e, "Malformed workspace_update payload; dropping"),
        },
        FRAME_AUTH_RESPONSE => shared.emit(&ChannelEvent::AuthResponse(frame.data)),
        FRAME_ERROR => shared.emit(&ChannelEvent::Error(frame.data)),
        other => shared.emit(&ChannelEvent::Other {
            kind: other.to_string(),
            data: frame.data,
        }),
    }
    Ok(())
}

/// Wrap and transmit one outbound frame.
async fn send_frame(
    ws: &mut WsStream,
    kind: &str,
    data: serde_json::Value,
) -> Result<(), String> {
    let frame = Frame {
        kind: kind.to_string(),
        data,
        timestamp: Utc::now().to_rfc3339(),
    };
    let payload = serde_json::to_string(&frame)
        .map_err(|e| format!("Failed to serialize {kind} frame: {e}"))?;
    debug!(kind = %kind, "Sending realtime frame");
    ws.send(Message::Text(payload.into()))
        .await
        .map_err(|e| format!("Failed to send {kind} frame: {e}"))
}

/// Close the transport with the graceful code so the peer does not treat
/// the departure as a failure.
async fn close_graceful(ws: &mut WsStream) {
    let frame = CloseFrame { code: CloseCode::Normal, reason: "client destroyed".into() };
    if let Err(e) = ws.close(Some(frame)).await {
        debug!(error = %e, "Graceful close failed");
    }
}

/// Wait out a reconnect delay while staying responsive to commands. A
/// manual `connect()` short-circuits the wait; `destroy()` cancels the
/// pending reconnect entirely.
async fn wait_reconnect(cmd_rx: &mut mpsc::UnboundedReceiver<Command>, delay: Duration) -> Wait {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            () = &mut sleep => return Wait::Elapsed,
            cmd = cmd_rx.recv() => match cmd {
                None => return Wait::HandleDropped,
                Some(Command::Destroy) => return Wait::Destroyed,
                Some(Command::Connect) => return Wait::Elapsed,
                Some(Command::Send { kind, .. }) => {
                    warn!(kind = %kind, "Cannot send message, connection not open");
                }
            }
        }
    }
}

/// Terminal cleanup: no further transitions or notifications occur after
/// this point.
fn teardown(shared: &Shared) {
    shared.mark_destroyed();
    shared.set_state(ConnectionState::Disconnected);
    shared.registry.write().clear();
}
