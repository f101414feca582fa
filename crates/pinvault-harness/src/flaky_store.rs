//! Secret store with injectable failures.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pinvault_core::{MemorySecretStore, SecretStore, StoreError};
use zeroize::Zeroizing;

#[derive(Debug, Default)]
struct Failures {
    /// Writes still allowed before every write fails. `None` means unlimited.
    writes_allowed: Option<usize>,
    reads_fail: bool,
    removes_fail: bool,
}

/// [`MemorySecretStore`] that fails on command.
///
/// Clones share entries and failure settings.
#[derive(Debug, Clone, Default)]
pub struct FlakySecretStore {
    inner: MemorySecretStore,
    failures: Arc<Mutex<Failures>>,
}

impl FlakySecretStore {
    /// Store that never fails until told to.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `n` more writes, then fail every write.
    pub fn fail_writes_after(&self, n: usize) {
        self.failures().writes_allowed = Some(n);
    }

    /// Make reads fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.failures().reads_fail = fail;
    }

    /// Make removals fail (or succeed again).
    pub fn fail_removes(&self, fail: bool) {
        self.failures().removes_fail = fail;
    }

    /// Clear all injected failures.
    pub fn heal(&self) {
        *self.failures() = Failures::default();
    }

    /// The entries as they are, bypassing failures.
    pub fn entries(&self) -> &MemorySecretStore {
        &self.inner
    }

    fn failures(&self) -> MutexGuard<'_, Failures> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SecretStore for FlakySecretStore {
    fn get(&self, service: &str, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
        if self.failures().reads_fail {
            return Err(StoreError::Unavailable("device locked".to_string()));
        }
        self.inner.get(service, key)
    }

    fn set(&self, service: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        {
            let mut failures = self.failures();
            match failures.writes_allowed.as_mut() {
                Some(0) => return Err(StoreError::Backend("write rejected".to_string())),
                Some(n) => *n -= 1,
                None => {},
            }
        }
        self.inner.set(service, key, value)
    }

    fn remove(&self, service: &str, key: &str) -> Result<(), StoreError> {
        if self.failures().removes_fail {
            return Err(StoreError::Backend("remove rejected".to_string()));
        }
        self.inner.remove(service, key)
    }
}
