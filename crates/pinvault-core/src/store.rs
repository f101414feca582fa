//! Durable local secret storage.
//!
//! Production stores are platform credential stores (keychain, keystore)
//! configured so entries survive an app reinstall on the same device. The
//! client writes exactly two entries and relies on the store only for
//! single-entry durability; pair consistency is enforced by the caller.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use thiserror::Error;
use zeroize::Zeroizing;

/// Errors from the local secret store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store is locked or otherwise not reachable right now.
    #[error("secret store unavailable: {0}")]
    Unavailable(String),

    /// The backend reported a failure.
    #[error("secret store backend error: {0}")]
    Backend(String),
}

/// Keyed byte-string storage, addressed by `(service, key)`.
pub trait SecretStore: Send + Sync {
    /// Read an entry. `Ok(None)` when absent.
    fn get(&self, service: &str, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError>;

    /// Create or overwrite an entry.
    fn set(&self, service: &str, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove an entry. Removing an absent entry succeeds.
    fn remove(&self, service: &str, key: &str) -> Result<(), StoreError>;
}

impl<S: SecretStore + ?Sized> SecretStore for Arc<S> {
    fn get(&self, service: &str, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
        (**self).get(service, key)
    }

    fn set(&self, service: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).set(service, key, value)
    }

    fn remove(&self, service: &str, key: &str) -> Result<(), StoreError> {
        (**self).remove(service, key)
    }
}

type EntryKey = (String, String);

/// In-memory store for tests and ephemeral installs.
///
/// Clones share the same entries, so a test can keep a handle and inspect
/// what the client wrote.
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    entries: Arc<Mutex<HashMap<EntryKey, Zeroizing<Vec<u8>>>>>,
}

impl MemorySecretStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an entry exists.
    pub fn contains(&self, service: &str, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(&(service.to_string(), key.to_string())))
            .unwrap_or(false)
    }

    /// Number of stored entries across all services.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("memory store lock poisoned".to_string())
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, service: &str, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
        let entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        Ok(entries.get(&(service.to_string(), key.to_string())).cloned())
    }

    fn set(&self, service: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        entries.insert((service.to_string(), key.to_string()), Zeroizing::new(value.to_vec()));
        Ok(())
    }

    fn remove(&self, service: &str, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        entries.remove(&(service.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_missing_entry_is_none() {
        let store = MemorySecretStore::new();
        assert_eq!(store.get("svc", "masterKey").expect("get"), None);
    }

    #[test]
    fn set_then_get_returns_value() {
        let store = MemorySecretStore::new();
        store.set("svc", "pinKey2", &[1, 2, 3]).expect("set");

        let value = store.get("svc", "pinKey2").expect("get").expect("present");
        assert_eq!(value.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn services_are_isolated() {
        let store = MemorySecretStore::new();
        store.set("a", "masterKey", &[1]).expect("set");

        assert!(store.contains("a", "masterKey"));
        assert!(!store.contains("b", "masterKey"));
    }

    #[test]
    fn remove_absent_entry_succeeds() {
        let store = MemorySecretStore::new();
        assert!(store.remove("svc", "masterKey").is_ok());
        assert!(store.is_empty());
    }

    #[test]
    fn clones_share_entries() {
        let store = MemorySecretStore::new();
        let handle = store.clone();

        store.set("svc", "masterKey", &[9; 32]).expect("set");
        assert_eq!(handle.len(), 1);
    }
}
