//! Key backup client.
//!
//! [`KeyBackupClient`] is the public surface. Each operation is one linear
//! flow (derive, fetch nonce, build, seal, send, open, interpret, persist)
//! with no internal retries. All operations, including the local-only ones,
//! run through a single async lane so no caller can observe a half-written
//! key pair.

use pinvault_core::{AttestationProvider, Environment, SecretStore, Transport};
use pinvault_crypto::{
    PinKey1, StretchedPin, derive_master_key, derive_pin_key1, derive_registration_lock_token,
    derive_stretched_pin, generate_pin_key2,
};
use tokio::sync::Mutex;

use crate::{
    KeyBackupError,
    config::{ConfigError, KeyBackupConfig},
    envelope::{EnclaveCall, EnclaveEnvelope},
    local_keys::{LocalKeyStore, LocalKeys},
    status::{backup_outcome, delete_outcome, restore_outcome},
};

/// PIN-protected key backup client.
///
/// # Type Parameters
///
/// - `E`: clock and CSPRNG
/// - `A`: attestation session provider
/// - `T`: transport for nonce and enclave requests
/// - `S`: durable local secret store
pub struct KeyBackupClient<E, A, T, S> {
    envelope: EnclaveEnvelope<E, A, T>,
    env: E,
    store: S,
    keychain_service: String,
    maximum_key_attempts: u32,

    /// Serializes every operation.
    lane: Mutex<()>,
}

impl<E, A, T, S> KeyBackupClient<E, A, T, S>
where
    E: Environment,
    A: AttestationProvider,
    T: Transport,
    S: SecretStore,
{
    /// Create a client from validated configuration and its collaborators.
    pub fn new(
        config: KeyBackupConfig,
        env: E,
        attestation: A,
        transport: T,
        store: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let service_id = config.service_id_bytes()?;
        let valid_from_skew = config.valid_from_skew();

        let envelope = EnclaveEnvelope::new(
            env.clone(),
            attestation,
            transport,
            config.enclave_name,
            service_id,
            valid_from_skew,
        );

        Ok(Self {
            envelope,
            env,
            store,
            keychain_service: config.keychain_service,
            maximum_key_attempts: config.maximum_key_attempts,
            lane: Mutex::new(()),
        })
    }

    /// Check `pin` against the locally stored keys. No network I/O.
    ///
    /// Returns false when no keys are stored, when the PIN is wrong, and when
    /// the store cannot be read. Callers cannot distinguish these.
    pub async fn verify_pin(&self, pin: &str) -> bool {
        let _lane = self.lane.lock().await;

        let stored = match self.local().load() {
            Ok(Some(stored)) => stored,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(operation = "verify", error = %e, "cannot read local keys");
                return false;
            },
        };

        let Ok(pin_key1) = derive_pin_key1(&derive_stretched_pin(pin)) else {
            return false;
        };
        derive_master_key(&pin_key1, &stored.pin_key2)
            .is_ok_and(|candidate| stored.master_key.ct_eq(&candidate))
    }

    /// Retrieve the server share with `pin` and persist the rebuilt key pair.
    ///
    /// Local storage is untouched unless the enclave answers `Ok`.
    pub async fn restore_keys(&self, pin: &str) -> Result<(), KeyBackupError> {
        let _lane = self.lane.lock().await;
        tracing::info!(operation = "restore", "restoring keys from enclave");

        let result = self.restore(pin).await;
        Self::log_outcome("restore", &result);
        result
    }

    /// Generate a fresh server share, back it up under `pin` and persist the
    /// key pair.
    ///
    /// The enclave is told to allow the configured number of PIN attempts on
    /// future restores. Nothing is persisted unless the enclave answers `Ok`.
    pub async fn generate_and_backup_keys(&self, pin: &str) -> Result<(), KeyBackupError> {
        let _lane = self.lane.lock().await;
        tracing::info!(
            operation = "backup",
            tries = self.maximum_key_attempts,
            "backing up new keys"
        );

        let result = self.backup(pin).await;
        Self::log_outcome("backup", &result);
        result
    }

    /// Delete the enclave backup, then clear the local pair.
    ///
    /// Local keys are kept if the enclave exchange fails.
    pub async fn delete_keys(&self) -> Result<(), KeyBackupError> {
        let _lane = self.lane.lock().await;
        tracing::info!(operation = "delete", "deleting enclave backup");

        let result = self.delete().await;
        Self::log_outcome("delete", &result);
        result
    }

    /// Remove the local pair without contacting the enclave.
    pub async fn clear_local_keys(&self) -> Result<(), KeyBackupError> {
        let _lane = self.lane.lock().await;
        self.local().clear()?;
        tracing::info!(operation = "clear", "local keys cleared");
        Ok(())
    }

    /// Whether a complete key pair is stored locally.
    pub async fn has_local_keys(&self) -> bool {
        let _lane = self.lane.lock().await;
        self.local().is_present().unwrap_or_else(|e| {
            tracing::warn!(operation = "has_local_keys", error = %e, "cannot read local keys");
            false
        })
    }

    /// Hex registration lock token for the stored MasterKey, if any.
    pub async fn derive_registration_lock_token(&self) -> Option<String> {
        let _lane = self.lane.lock().await;

        let stored = match self.local().load() {
            Ok(stored) => stored?,
            Err(e) => {
                tracing::warn!(
                    operation = "registration_lock",
                    error = %e,
                    "cannot read local keys"
                );
                return None;
            },
        };

        derive_registration_lock_token(&stored.master_key)
            .map_err(|e| {
                tracing::error!(
                    operation = "registration_lock",
                    error = %e,
                    "token derivation failed"
                );
            })
            .ok()
    }

    async fn restore(&self, pin: &str) -> Result<(), KeyBackupError> {
        let (stretched_pin, pin_key1) = Self::derive_pin(pin)?;

        let response =
            self.envelope.exchange(EnclaveCall::Restore { stretched_pin: &stretched_pin }).await?;
        let pin_key2 = restore_outcome(response)?;

        let master_key = derive_master_key(&pin_key1, &pin_key2)
            .map_err(|e| KeyBackupError::assertion(e.to_string()))?;
        self.local().store(&LocalKeys { master_key, pin_key2 })?;
        Ok(())
    }

    async fn backup(&self, pin: &str) -> Result<(), KeyBackupError> {
        let (stretched_pin, pin_key1) = Self::derive_pin(pin)?;

        let share = self.env.random_array().map_err(|e| KeyBackupError::assertion(e.to_string()))?;
        let pin_key2 = generate_pin_key2(share);
        let master_key = derive_master_key(&pin_key1, &pin_key2)
            .map_err(|e| KeyBackupError::assertion(e.to_string()))?;

        let response = self
            .envelope
            .exchange(EnclaveCall::Backup {
                stretched_pin: &stretched_pin,
                pin_key2: &pin_key2,
                tries: self.maximum_key_attempts,
            })
            .await?;
        backup_outcome(response)?;

        self.local().store(&LocalKeys { master_key, pin_key2 })?;
        Ok(())
    }

    async fn delete(&self) -> Result<(), KeyBackupError> {
        let response = self.envelope.exchange(EnclaveCall::Delete).await?;
        delete_outcome(response)?;
        self.local().clear()?;
        Ok(())
    }

    fn local(&self) -> LocalKeyStore<'_, S> {
        LocalKeyStore::new(&self.store, &self.keychain_service)
    }

    fn derive_pin(pin: &str) -> Result<(StretchedPin, PinKey1), KeyBackupError> {
        let stretched_pin = derive_stretched_pin(pin);
        let pin_key1 =
            derive_pin_key1(&stretched_pin).map_err(|e| KeyBackupError::assertion(e.to_string()))?;
        Ok((stretched_pin, pin_key1))
    }

    fn log_outcome(operation: &'static str, result: &Result<(), KeyBackupError>) {
        match result {
            Ok(()) => tracing::info!(operation, "operation succeeded"),
            Err(KeyBackupError::InvalidPin { tries_remaining }) => {
                tracing::warn!(operation, tries_remaining, "enclave rejected PIN");
            },
            Err(e) if e.is_expected() => tracing::warn!(operation, error = %e, "operation failed"),
            Err(e) => tracing::error!(operation, error = %e, "operation aborted"),
        }
    }
}
