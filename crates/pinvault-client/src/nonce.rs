//! Nonce fetch.
//!
//! Every backup, restore and delete attempt starts with exactly one nonce
//! fetch over the attestation session it will use. Nonces are never cached:
//! [`NonceMaterial`] is not `Clone`, and building a request consumes it.

use pinvault_core::{AttestationSession, NonceRequest, Transport};
use pinvault_proto::NonceResponseBody;

use crate::KeyBackupError;

/// Single-use backup id and nonce pair.
pub struct NonceMaterial {
    /// Backup id the request must target.
    pub backup_id: Vec<u8>,
    /// Nonce to present exactly once.
    pub nonce: Vec<u8>,
    /// PIN attempts the enclave reports for this backup id.
    pub tries_remaining: u32,
}

impl std::fmt::Debug for NonceMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceMaterial")
            .field("backup_id", &format!("<{} bytes>", self.backup_id.len()))
            .field("nonce", &format!("<{} bytes>", self.nonce.len()))
            .field("tries_remaining", &self.tries_remaining)
            .finish()
    }
}

/// Fetches [`NonceMaterial`] over an attestation session.
pub struct NonceService<'a, T> {
    transport: &'a T,
}

impl<'a, T: Transport> NonceService<'a, T> {
    /// Wrap a transport.
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Fetch a fresh backup id and nonce bound to `session`.
    pub async fn fetch(
        &self,
        session: &AttestationSession,
    ) -> Result<NonceMaterial, KeyBackupError> {
        let raw = self.transport.send_nonce_request(NonceRequest::new(session)).await?;

        let body: NonceResponseBody = serde_json::from_value(raw)
            .map_err(|e| KeyBackupError::protocol(format!("malformed nonce response: {e}")))?;

        let backup_id = body.backup_id().map_err(|e| KeyBackupError::protocol(e.to_string()))?;
        let nonce = body.nonce().map_err(|e| KeyBackupError::protocol(e.to_string()))?;

        if backup_id.is_empty() {
            return Err(KeyBackupError::protocol("nonce response has empty backup id"));
        }
        if nonce.is_empty() {
            return Err(KeyBackupError::protocol("nonce response has empty nonce"));
        }

        tracing::debug!(tries = body.tries, "fetched enclave nonce");

        Ok(NonceMaterial { backup_id, nonce, tries_remaining: body.tries })
    }
}
