//! Delete payloads.

use serde::{Deserialize, Serialize};

/// Remove the backup for this account. Carries no PIN material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    /// Decoded enclave service id.
    pub service_id: Vec<u8>,
    /// Backup id handed out with the nonce.
    pub backup_id: Vec<u8>,
}

/// Enclave reply to [`DeleteRequest`]. Its presence alone signals success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {}
