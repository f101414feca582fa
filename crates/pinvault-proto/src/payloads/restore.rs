//! Restore payloads.
//!
//! A restore presents the stretched PIN and, on a match, receives the server
//! share back. Each mismatch costs one of the attempts set at backup time.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::redacted;

/// Ask the enclave to release the server share.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRequest {
    /// Decoded enclave service id.
    pub service_id: Vec<u8>,
    /// Backup id handed out with the nonce.
    pub backup_id: Vec<u8>,
    /// Single-use nonce bound to this request.
    pub nonce: Vec<u8>,
    /// Unix seconds before which the enclave must reject the request.
    pub valid_from: u64,
    /// Stretched PIN.
    pub pin: Vec<u8>,
}

impl std::fmt::Debug for RestoreRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreRequest")
            .field("service_id", &self.service_id.len())
            .field("backup_id", &self.backup_id.len())
            .field("nonce", &self.nonce.len())
            .field("valid_from", &self.valid_from)
            .field("pin", &redacted(&self.pin))
            .finish()
    }
}

/// Outcome reported by the enclave for a restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum RestoreStatus {
    /// PIN matched, `data` carries the server share.
    Ok = 1,
    /// Nonce expired, already consumed, or not issued for this backup id.
    NonceMismatch = 2,
    /// `valid_from` lies in the enclave's future.
    NotYetValid = 3,
    /// No backup exists for this account.
    Missing = 4,
    /// Wrong PIN, `tries` carries the remaining attempts.
    PinMismatch = 5,
}

/// Enclave reply to [`RestoreRequest`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResponse {
    /// Absent status is a protocol violation.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<RestoreStatus>,
    /// Replacement nonce. Unused by the client.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nonce: Option<Vec<u8>>,
    /// Server share, present on `Ok`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Vec<u8>>,
    /// Remaining PIN attempts, present on `PinMismatch`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tries: Option<u32>,
}

impl std::fmt::Debug for RestoreResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreResponse")
            .field("status", &self.status)
            .field("nonce", &self.nonce.as_ref().map(Vec::len))
            .field("data", &self.data.as_deref().map(redacted))
            .field("tries", &self.tries)
            .finish()
    }
}
