//! Backup payloads.
//!
//! A backup uploads the stretched PIN and the server share to the enclave,
//! together with the number of PIN attempts the enclave allows on later
//! restores.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::redacted;

/// Store the server share for this account.
///
/// # Security
///
/// - **Debug Redaction**: `data` and `pin` are secret and never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRequest {
    /// Decoded enclave service id.
    pub service_id: Vec<u8>,
    /// Backup id handed out with the nonce.
    pub backup_id: Vec<u8>,
    /// Single-use nonce bound to this request.
    pub nonce: Vec<u8>,
    /// Unix seconds before which the enclave must reject the request.
    pub valid_from: u64,
    /// Server share (PinKey2).
    pub data: Vec<u8>,
    /// Stretched PIN.
    pub pin: Vec<u8>,
    /// PIN attempts the enclave allows on future restores.
    pub tries: u32,
}

impl std::fmt::Debug for BackupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupRequest")
            .field("service_id", &self.service_id.len())
            .field("backup_id", &self.backup_id.len())
            .field("nonce", &self.nonce.len())
            .field("valid_from", &self.valid_from)
            .field("data", &redacted(&self.data))
            .field("pin", &redacted(&self.pin))
            .field("tries", &self.tries)
            .finish()
    }
}

/// Outcome reported by the enclave for a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum BackupStatus {
    /// Share stored.
    Ok = 1,
    /// Nonce expired, already consumed, or not issued for this backup id.
    NonceMismatch = 2,
    /// `valid_from` lies in the enclave's future.
    NotYetValid = 3,
}

/// Enclave reply to [`BackupRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupResponse {
    /// Absent status is a protocol violation.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<BackupStatus>,
    /// Replacement nonce. Unused by the client.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nonce: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn debug_redacts_pin_and_data() {
        let request = BackupRequest {
            service_id: vec![0; 32],
            backup_id: vec![0; 32],
            nonce: vec![0; 32],
            valid_from: 0,
            data: vec![0xAB; 32],
            pin: vec![0xCD; 32],
            tries: 10,
        };

        let debug = format!("{request:?}");
        assert!(debug.contains("<redacted 32 bytes>"));
        assert!(!debug.contains("171"));
        assert!(!debug.contains("205"));
    }

    #[test]
    fn status_uses_numeric_wire_values() {
        let response = BackupResponse { status: Some(BackupStatus::NotYetValid), nonce: None };
        let bytes = codec::encode(&response).expect("encode");

        let value: ciborium::Value = codec::decode(&bytes).expect("decode");
        let status = value
            .as_map()
            .and_then(|m| m.iter().find(|(k, _)| k.as_text() == Some("status")))
            .map(|(_, v)| v.clone());
        assert_eq!(status, Some(ciborium::Value::Integer(3.into())));
    }

    #[test]
    fn unknown_status_fails_to_decode() {
        let bytes = codec::encode(&ciborium::Value::Map(vec![(
            ciborium::Value::Text("status".to_string()),
            ciborium::Value::Integer(9.into()),
        )]))
        .expect("encode");

        assert!(codec::decode::<BackupResponse>(&bytes).is_err());
    }

    #[test]
    fn missing_status_decodes_as_none() {
        let bytes = codec::encode(&ciborium::Value::Map(vec![])).expect("encode");
        let response: BackupResponse = codec::decode(&bytes).expect("decode");
        assert_eq!(response.status, None);
    }
}
