//! Client configuration.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Allowed PIN attempts the enclave enforces on future restores.
pub const DEFAULT_MAXIMUM_KEY_ATTEMPTS: u32 = 10;

/// How far `valid_from` is backdated, in seconds (24 hours).
pub const DEFAULT_VALID_FROM_SKEW_SECS: u64 = 24 * 60 * 60;

/// Local secret store service name.
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "KeyBackupService";

/// Configuration errors, reported when the client is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `enclave_name` is empty.
    #[error("enclave_name must not be empty")]
    MissingEnclaveName,

    /// `service_id` is empty or not hex.
    #[error("service_id must be non-empty hex: {reason}")]
    InvalidServiceId {
        /// Why decoding failed.
        reason: String,
    },

    /// `maximum_key_attempts` is zero.
    #[error("maximum_key_attempts must be at least 1")]
    ZeroKeyAttempts,

    /// `keychain_service` is empty.
    #[error("keychain_service must not be empty")]
    MissingKeychainService,
}

/// Key backup client configuration.
///
/// `enclave_name` and `service_id` identify a deployment and have no useful
/// default; the remaining fields default to the protocol's standard values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KeyBackupConfig {
    /// Enclave name handed to the attestation provider.
    pub enclave_name: String,
    /// Hex service id placed in every enclave request.
    pub service_id: String,
    /// PIN attempts the enclave allows on future restores.
    pub maximum_key_attempts: u32,
    /// Backdating applied to `valid_from`, absorbing client clock drift.
    pub valid_from_skew_secs: u64,
    /// Service name for the two local secret store entries.
    pub keychain_service: String,
}

impl Default for KeyBackupConfig {
    fn default() -> Self {
        Self {
            enclave_name: String::new(),
            service_id: String::new(),
            maximum_key_attempts: DEFAULT_MAXIMUM_KEY_ATTEMPTS,
            valid_from_skew_secs: DEFAULT_VALID_FROM_SKEW_SECS,
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
        }
    }
}

impl KeyBackupConfig {
    /// Config for one enclave deployment, other fields at their defaults.
    pub fn new(enclave_name: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self { enclave_name: enclave_name.into(), service_id: service_id.into(), ..Self::default() }
    }

    /// Check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enclave_name.is_empty() {
            return Err(ConfigError::MissingEnclaveName);
        }
        if self.maximum_key_attempts == 0 {
            return Err(ConfigError::ZeroKeyAttempts);
        }
        if self.keychain_service.is_empty() {
            return Err(ConfigError::MissingKeychainService);
        }
        self.service_id_bytes().map(|_| ())
    }

    /// Decoded service id.
    pub fn service_id_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        if self.service_id.is_empty() {
            return Err(ConfigError::InvalidServiceId { reason: "empty".to_string() });
        }
        hex::decode(&self.service_id)
            .map_err(|e| ConfigError::InvalidServiceId { reason: e.to_string() })
    }

    /// Backdating applied to `valid_from`.
    pub fn valid_from_skew(&self) -> Duration {
        Duration::from_secs(self.valid_from_skew_secs)
    }
}
