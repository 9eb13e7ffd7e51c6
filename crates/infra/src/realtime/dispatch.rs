//! Event classification and listener dispatch
//!
//! Inbound frames are classified into a tagged event for the known kinds and
//! a generic passthrough bucket for everything else, so forward-compatible
//! servers can introduce new frame kinds without a client change. Listener
//! sets use `Arc` identity: registering the same callback handle twice is
//! one registration, and a panicking callback never suppresses delivery to
//! its siblings.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use estation_domain::{ConnectionChange, ServiceUpdate, WorkspaceUpdate};
use tracing::warn;

/// Callback registered for a realtime event kind.
pub type Listener = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Key a listener set is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// Client-generated connection transitions.
    Connection,
    /// `service_update` frames.
    ServiceUpdate,
    /// `workspace_update` frames.
    WorkspaceUpdate,
    /// `auth_response` frames.
    AuthResponse,
    /// Server `error` frames.
    Error,
    /// Generic passthrough keyed by the literal frame kind.
    Other(String),
}

impl EventKey {
    /// Listener-facing name of this key (the names consumers register
    /// under, matching the original event vocabulary).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            EventKey::Connection => "connection",
            EventKey::ServiceUpdate => "serviceUpdate",
            EventKey::WorkspaceUpdate => "workspaceUpdate",
            EventKey::AuthResponse => "authResponse",
            EventKey::Error => "error",
            EventKey::Other(kind) => kind,
        }
    }
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        match name {
            "connection" => EventKey::Connection,
            "serviceUpdate" => EventKey::ServiceUpdate,
            "workspaceUpdate" => EventKey::WorkspaceUpdate,
            "authResponse" => EventKey::AuthResponse,
            "error" => EventKey::Error,
            other => EventKey::Other(other.to_string()),
        }
    }
}

/// A dispatched realtime event with its payload typed for the known kinds.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Connection(ConnectionChange),
    ServiceUpdate(ServiceUpdate),
    WorkspaceUpdate(WorkspaceUpdate),
    AuthResponse(serde_json::Value),
    Error(serde_json::Value),
    Other { kind: String, data: serde_json::Value },
}

impl ChannelEvent {
    /// The listener set this event is delivered to.
    #[must_use]
    pub fn key(&self) -> EventKey {
        match self {
            ChannelEvent::Connection(_) => EventKey::Connection,
            ChannelEvent::ServiceUpdate(_) => EventKey::ServiceUpdate,
            ChannelEvent::WorkspaceUpdate(_) => EventKey::WorkspaceUpdate,
            ChannelEvent::AuthResponse(_) => EventKey::AuthResponse,
            ChannelEvent::Error(_) => EventKey::Error,
            ChannelEvent::Other { kind, .. } => EventKey::Other(kind.clone()),
        }
    }
}

/// Listener sets keyed by event kind. Set semantics by `Arc` identity.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: HashMap<EventKey, Vec<Listener>>,
}

impl ListenerRegistry {
    /// Register `listener` under `key`. Re-registering the same handle is a
    /// no-op, so duplicate notification can never occur.
    pub fn add(&mut self, key: EventKey, listener: Listener) {
        let set = self.listeners.entry(key).or_default();
        if !set.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
            set.push(listener);
        }
    }

    /// Remove `listener` from the set under `key`, matching by identity.
    pub fn remove(&mut self, key: &EventKey, listener: &Listener) {
        if let Some(set) = self.listeners.get_mut(key) {
            set.retain(|existing| !Arc::ptr_eq(existing, listener));
            if set.is_empty() {
                self.listeners.remove(key);
            }
        }
    }

    /// Drop every registration.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Snapshot of the listener set for one kind. Dispatch invokes the
    /// snapshot after releasing the registry lock, so a listener may call
    /// `on`/`off` re-entrantly without deadlocking.
    pub fn snapshot(&self, key: &EventKey) -> Vec<Listener> {
        self.listeners.get(key).cloned().unwrap_or_default()
    }

    /// Deliver `event` to every listener registered for its kind, in
    /// registration order.
    #[cfg(test)]
    pub fn emit(&self, event: &ChannelEvent) {
        deliver(&self.snapshot(&event.key()), event);
    }

    #[cfg(test)]
    pub fn len(&self, key: &EventKey) -> usize {
        self.listeners.get(key).map_or(0, Vec::len)
    }
}

/// Invoke a listener snapshot in registration order. A panicking listener
/// is logged and skipped; the remaining listeners still run.
pub(crate) fn deliver(listeners: &[Listener], event: &ChannelEvent) {
    for listener in listeners {
        if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
            warn!(event = %event.key().name(), "Listener panicked during dispatch");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use estation_domain::ConnectionStatus;

    use super::*;

    fn connection_event() -> ChannelEvent {
        ChannelEvent::Connection(ConnectionChange::connected())
    }

    #[test]
    fn event_key_round_trips_known_names() {
        for name in ["connection", "serviceUpdate", "workspaceUpdate", "authResponse", "error"] {
            let key = EventKey::from(name);
            assert_eq!(key.name(), name);
        }
        assert_eq!(EventKey::from("telemetry_update"), EventKey::Other("telemetry_update".into()));
    }

    #[test]
    fn duplicate_registration_is_idempotent() {
        let mut registry = ListenerRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = hits.clone();
        let listener: Listener = Arc::new(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        registry.add(EventKey::Connection, listener.clone());
        registry.add(EventKey::Connection, listener.clone());
        assert_eq!(registry.len(&EventKey::Connection), 1);

        registry.emit(&connection_event());
        assert_eq!(hits.load(Ordering::SeqCst), 1, "one registration, one invocation");
    }

    #[test]
    fn remove_matches_by_identity() {
        let mut registry = ListenerRegistry::default();
        let first: Listener = Arc::new(|_| {});
        let second: Listener = Arc::new(|_| {});

        registry.add(EventKey::Error, first.clone());
        registry.add(EventKey::Error, second);
        registry.remove(&EventKey::Error, &first);
        assert_eq!(registry.len(&EventKey::Error), 1);
    }

    #[test]
    fn panicking_listener_does_not_suppress_siblings() {
        let mut registry = ListenerRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));

        registry.add(EventKey::Connection, Arc::new(|_| panic!("listener bug")));
        let hits_clone = hits.clone();
        registry.add(
            EventKey::Connection,
            Arc::new(move |_| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        registry.emit(&connection_event());
        assert_eq!(hits.load(Ordering::SeqCst), 1, "sibling listener must still fire");
    }

    #[test]
    fn emit_only_reaches_matching_kind() {
        let mut registry = ListenerRegistry::default();
        let connection_hits = Arc::new(AtomicUsize::new(0));
        let error_hits = Arc::new(AtomicUsize::new(0));

        let c = connection_hits.clone();
        registry.add(
            EventKey::Connection,
            Arc::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let e = error_hits.clone();
        registry.add(
            EventKey::Error,
            Arc::new(move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            }),
        );

        registry.emit(&connection_event());
        assert_eq!(connection_hits.load(Ordering::SeqCst), 1);
        assert_eq!(error_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn generic_kind_dispatches_by_literal_name() {
        let mut registry = ListenerRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        registry.add(
            EventKey::from("acquisition_update"),
            Arc::new(move |event| {
                if let ChannelEvent::Other { kind, data } = event {
                    assert_eq!(kind, "acquisition_update");
                    assert_eq!(data["pass"], 42);
                }
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );

        registry.emit(&ChannelEvent::Other {
            kind: "acquisition_update".to_string(),
            data: serde_json::json!({"pass": 42}),
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connection_event_carries_status() {
        let event = connection_event();
        match event {
            ChannelEvent::Connection(change) => {
                assert_eq!(change.status, ConnectionStatus::Connected);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
