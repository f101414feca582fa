//! Local persistence of the key pair.
//!
//! The store holds exactly two entries under one service name: the MasterKey
//! and the server share (PinKey2). They are either both present and valid or
//! treated as absent. A lone entry, or one of the wrong length, reads as "no
//! local keys" and is logged.

use pinvault_core::{SecretStore, StoreError};
use pinvault_crypto::{MasterKey, PinKey2};

/// Entry name for the MasterKey.
pub const MASTER_KEY_ENTRY: &str = "masterKey";

/// Entry name for the server share.
pub const PIN_KEY2_ENTRY: &str = "pinKey2";

/// The locally cached key pair.
pub struct LocalKeys {
    /// Derived MasterKey.
    pub master_key: MasterKey,
    /// Server share used to derive it.
    pub pin_key2: PinKey2,
}

/// Typed view over a [`SecretStore`] for the key pair.
pub struct LocalKeyStore<'a, S> {
    store: &'a S,
    service: &'a str,
}

impl<'a, S: SecretStore> LocalKeyStore<'a, S> {
    /// View `store` under the given service name.
    pub fn new(store: &'a S, service: &'a str) -> Self {
        Self { store, service }
    }

    /// Load the pair. `Ok(None)` unless both entries exist with valid lengths.
    pub fn load(&self) -> Result<Option<LocalKeys>, StoreError> {
        let master = self.store.get(self.service, MASTER_KEY_ENTRY)?;
        let share = self.store.get(self.service, PIN_KEY2_ENTRY)?;

        match (master, share) {
            (None, None) => Ok(None),
            (Some(master), Some(share)) => {
                match (MasterKey::from_slice(&master), PinKey2::from_slice(&share)) {
                    (Ok(master_key), Ok(pin_key2)) => Ok(Some(LocalKeys { master_key, pin_key2 })),
                    (Err(e), _) | (_, Err(e)) => {
                        tracing::warn!(error = %e, "local key entry is malformed, ignoring pair");
                        Ok(None)
                    },
                }
            },
            (master, _) => {
                tracing::warn!(
                    has_master_key = master.is_some(),
                    "only one local key entry present, ignoring it"
                );
                Ok(None)
            },
        }
    }

    /// Persist the pair, share first.
    ///
    /// Any previous pair is removed before the first write, so an interrupted
    /// store leaves at most one entry, never a new share beside an old
    /// MasterKey. If the second write fails both entries are removed
    /// best-effort.
    pub fn store(&self, keys: &LocalKeys) -> Result<(), StoreError> {
        self.clear()?;
        self.store.set(self.service, PIN_KEY2_ENTRY, keys.pin_key2.as_bytes())?;

        if let Err(e) = self.store.set(self.service, MASTER_KEY_ENTRY, keys.master_key.as_bytes()) {
            tracing::error!(error = %e, "failed to store master key, rolling back");
            if let Err(rollback) = self.clear() {
                tracing::warn!(error = %rollback, "rollback of local keys failed");
            }
            return Err(e);
        }

        Ok(())
    }

    /// Remove both entries. Absent entries are not an error.
    pub fn clear(&self) -> Result<(), StoreError> {
        let master = self.store.remove(self.service, MASTER_KEY_ENTRY);
        let share = self.store.remove(self.service, PIN_KEY2_ENTRY);
        master.and(share)
    }

    /// Whether a complete, valid pair is stored.
    pub fn is_present(&self) -> Result<bool, StoreError> {
        Ok(self.load()?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use pinvault_core::MemorySecretStore;

    use super::*;

    const SERVICE: &str = "KeyBackupService";

    fn keys() -> LocalKeys {
        LocalKeys {
            master_key: MasterKey::from_bytes([0x11; 32]),
            pin_key2: PinKey2::from_bytes([0x22; 32]),
        }
    }

    #[test]
    fn store_then_load() {
        let memory = MemorySecretStore::new();
        let local = LocalKeyStore::new(&memory, SERVICE);

        local.store(&keys()).unwrap();
        let loaded = local.load().unwrap().unwrap();

        assert_eq!(loaded.master_key.as_bytes(), &[0x11; 32]);
        assert_eq!(loaded.pin_key2.as_bytes(), &[0x22; 32]);
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn empty_store_has_no_keys() {
        let memory = MemorySecretStore::new();
        assert!(LocalKeyStore::new(&memory, SERVICE).load().unwrap().is_none());
    }

    #[test]
    fn lone_entry_reads_as_absent() {
        let memory = MemorySecretStore::new();
        memory.set(SERVICE, MASTER_KEY_ENTRY, &[0x11; 32]).unwrap();

        let local = LocalKeyStore::new(&memory, SERVICE);
        assert!(local.load().unwrap().is_none());
        assert!(!local.is_present().unwrap());
    }

    #[test]
    fn wrong_length_entry_reads_as_absent() {
        let memory = MemorySecretStore::new();
        memory.set(SERVICE, MASTER_KEY_ENTRY, &[0x11; 31]).unwrap();
        memory.set(SERVICE, PIN_KEY2_ENTRY, &[0x22; 32]).unwrap();

        assert!(LocalKeyStore::new(&memory, SERVICE).load().unwrap().is_none());
    }

    #[test]
    fn entries_are_scoped_by_service() {
        let memory = MemorySecretStore::new();
        LocalKeyStore::new(&memory, SERVICE).store(&keys()).unwrap();

        assert!(LocalKeyStore::new(&memory, "OtherService").load().unwrap().is_none());
    }

    #[test]
    fn clear_removes_both_and_is_idempotent() {
        let memory = MemorySecretStore::new();
        let local = LocalKeyStore::new(&memory, SERVICE);

        local.store(&keys()).unwrap();
        local.clear().unwrap();
        local.clear().unwrap();

        assert!(memory.is_empty());
    }

    /// Accepts one write, then fails every write after it.
    struct FailSecondWrite {
        inner: MemorySecretStore,
        writes: std::sync::atomic::AtomicUsize,
    }

    impl SecretStore for FailSecondWrite {
        fn get(
            &self,
            service: &str,
            key: &str,
        ) -> Result<Option<zeroize::Zeroizing<Vec<u8>>>, StoreError> {
            self.inner.get(service, key)
        }

        fn set(&self, service: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
            let n = self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                self.inner.set(service, key, value)
            } else {
                Err(StoreError::Backend("disk full".into()))
            }
        }

        fn remove(&self, service: &str, key: &str) -> Result<(), StoreError> {
            self.inner.remove(service, key)
        }
    }

    #[test]
    fn failed_second_write_rolls_back_first() {
        let failing = FailSecondWrite {
            inner: MemorySecretStore::new(),
            writes: std::sync::atomic::AtomicUsize::new(0),
        };
        let local = LocalKeyStore::new(&failing, SERVICE);

        let result = local.store(&keys());

        assert_eq!(result.unwrap_err(), StoreError::Backend("disk full".into()));
        assert!(failing.inner.is_empty());
    }

    /// Accepts `ops` operations, then fails every set and remove, as if the
    /// process died mid-write.
    struct CrashAfter {
        inner: MemorySecretStore,
        ops: std::sync::atomic::AtomicUsize,
    }

    impl CrashAfter {
        fn alive(&self) -> Result<(), StoreError> {
            let left = self.ops.load(std::sync::atomic::Ordering::SeqCst);
            if left == 0 {
                return Err(StoreError::Unavailable("process gone".into()));
            }
            self.ops.store(left - 1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    impl SecretStore for CrashAfter {
        fn get(
            &self,
            service: &str,
            key: &str,
        ) -> Result<Option<zeroize::Zeroizing<Vec<u8>>>, StoreError> {
            self.inner.get(service, key)
        }

        fn set(&self, service: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
            self.alive()?;
            self.inner.set(service, key, value)
        }

        fn remove(&self, service: &str, key: &str) -> Result<(), StoreError> {
            self.alive()?;
            self.inner.remove(service, key)
        }
    }

    #[test]
    fn interrupted_overwrite_never_pairs_new_share_with_old_master() {
        let crashing = CrashAfter {
            inner: MemorySecretStore::new(),
            ops: std::sync::atomic::AtomicUsize::new(usize::MAX),
        };
        let local = LocalKeyStore::new(&crashing, SERVICE);
        local.store(&keys()).unwrap();

        // Two removals and the share write succeed, then everything fails.
        crashing.ops.store(3, std::sync::atomic::Ordering::SeqCst);
        let replacement = LocalKeys {
            master_key: MasterKey::from_bytes([0x33; 32]),
            pin_key2: PinKey2::from_bytes([0x44; 32]),
        };
        assert!(local.store(&replacement).is_err());

        assert!(!crashing.inner.contains(SERVICE, MASTER_KEY_ENTRY));
        assert!(local.load().unwrap().is_none());
    }
}
