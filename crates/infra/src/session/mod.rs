//! Session credential storage
//!
//! The bearer token lives in a key-value store addressed by a configurable
//! key name. Both network clients hold only an `Arc<dyn SessionStore>` and
//! read the token fresh at the moment of use; neither caches it beyond a
//! single call. A token deleted between read and use is tolerated — the
//! server's own rejection path handles the stale credential.

use std::collections::HashMap;

use estation_domain::{EstationError, Result};
use parking_lot::RwLock;
use tracing::debug;

/// Service name the platform keychain entries are registered under.
const KEYCHAIN_SERVICE: &str = "estation";

/// Persisted key-value store for the session credential.
///
/// Implementations must be cheap to call on every outbound request.
pub trait SessionStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`. Removing an absent key is not
    /// an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Whether a value exists under `key`.
    fn exists(&self, key: &str) -> bool {
        matches!(self.get(key), Ok(Some(_)))
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

/// Platform keychain store (macOS Keychain, Windows Credential Manager,
/// Linux Secret Service).
#[derive(Debug, Default)]
pub struct KeychainSessionStore;

impl KeychainSessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn entry(key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYCHAIN_SERVICE, key)
            .map_err(|e| EstationError::Session(format!("Keychain entry unavailable: {e}")))
    }
}

impl SessionStore for KeychainSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match Self::entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(EstationError::Session(format!("Keychain read failed: {e}"))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        debug!(key = %key, "Storing session credential");
        Self::entry(key)?
            .set_password(value)
            .map_err(|e| EstationError::Session(format!("Keychain write failed: {e}")))
    }

    fn delete(&self, key: &str) -> Result<()> {
        debug!(key = %key, "Deleting session credential");
        match Self::entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(EstationError::Session(format!("Keychain delete failed: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get("estation_session").unwrap(), None);
        assert!(!store.exists("estation_session"));

        store.set("estation_session", "tok-123").unwrap();
        assert_eq!(store.get("estation_session").unwrap().as_deref(), Some("tok-123"));
        assert!(store.exists("estation_session"));
    }

    #[test]
    fn memory_store_delete_is_idempotent() {
        let store = MemorySessionStore::new();
        store.set("k", "v").unwrap();
        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        // Absent key: still not an error
        store.delete("k").unwrap();
    }

    #[test]
    fn memory_store_overwrites() {
        let store = MemorySessionStore::new();
        store.set("k", "first").unwrap();
        store.set("k", "second").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("second"));
    }
}
