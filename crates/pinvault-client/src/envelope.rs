//! Encrypted request/response exchange with the enclave.
//!
//! One call to [`EnclaveEnvelope::exchange`] performs, in order:
//!
//! 1. obtain an attestation session
//! 2. fetch a nonce over it
//! 3. build the typed request with `valid_from = now - skew`
//! 4. CBOR-encode and seal it with the client key, request id as AAD
//! 5. send it
//! 6. parse the JSON `{iv, data, mac}` reply
//! 7. open it with the server key and no AAD
//! 8. decode the outer response
//!
//! Status interpretation is left to [`crate::status`]. Nothing here retries.

use std::time::{Duration, UNIX_EPOCH};

use pinvault_core::{
    AttestationProvider, AttestationSession, EnclaveRequest, Environment, Transport,
};
use pinvault_crypto::{PinKey2, StretchedPin, open, seal};
use pinvault_proto::{
    BackupRequest, DeleteRequest, EncryptedRequestBody, EncryptedResponseBody, KeyBackupRequest,
    KeyBackupResponse, RequestKind, RestoreRequest, SealedParts,
};
use zeroize::Zeroizing;

use crate::{
    KeyBackupError,
    nonce::{NonceMaterial, NonceService},
};

/// Caller-supplied fields for one enclave operation.
pub enum EnclaveCall<'a> {
    /// Upload the stretched PIN and server share.
    Backup {
        /// Stretched PIN.
        stretched_pin: &'a StretchedPin,
        /// Server share to escrow.
        pin_key2: &'a PinKey2,
        /// Attempts the enclave allows on future restores.
        tries: u32,
    },
    /// Present the stretched PIN to retrieve the server share.
    Restore {
        /// Stretched PIN.
        stretched_pin: &'a StretchedPin,
    },
    /// Remove the escrowed share.
    Delete,
}

impl EnclaveCall<'_> {
    /// Operation this call performs.
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Backup { .. } => RequestKind::Backup,
            Self::Restore { .. } => RequestKind::Restore,
            Self::Delete => RequestKind::Delete,
        }
    }

    /// Build the outer request, consuming the nonce.
    fn into_request(
        self,
        service_id: &[u8],
        nonce: NonceMaterial,
        valid_from: u64,
    ) -> KeyBackupRequest {
        let NonceMaterial { backup_id, nonce, .. } = nonce;

        match self {
            Self::Backup { stretched_pin, pin_key2, tries } => {
                KeyBackupRequest::Backup(BackupRequest {
                    service_id: service_id.to_vec(),
                    backup_id,
                    nonce,
                    valid_from,
                    data: pin_key2.as_bytes().to_vec(),
                    pin: stretched_pin.as_bytes().to_vec(),
                    tries,
                })
            },
            Self::Restore { stretched_pin } => KeyBackupRequest::Restore(RestoreRequest {
                service_id: service_id.to_vec(),
                backup_id,
                nonce,
                valid_from,
                pin: stretched_pin.as_bytes().to_vec(),
            }),
            Self::Delete => KeyBackupRequest::Delete(DeleteRequest {
                service_id: service_id.to_vec(),
                backup_id,
            }),
        }
    }
}

/// Performs encrypted exchanges with one enclave deployment.
pub struct EnclaveEnvelope<E, A, T> {
    env: E,
    attestation: A,
    transport: T,
    enclave_name: String,
    service_id: Vec<u8>,
    valid_from_skew: Duration,
}

impl<E, A, T> EnclaveEnvelope<E, A, T>
where
    E: Environment,
    A: AttestationProvider,
    T: Transport,
{
    /// Create an envelope for the given deployment.
    pub fn new(
        env: E,
        attestation: A,
        transport: T,
        enclave_name: String,
        service_id: Vec<u8>,
        valid_from_skew: Duration,
    ) -> Self {
        Self { env, attestation, transport, enclave_name, service_id, valid_from_skew }
    }

    /// Run one request/response exchange.
    pub async fn exchange(
        &self,
        call: EnclaveCall<'_>,
    ) -> Result<KeyBackupResponse, KeyBackupError> {
        let kind = call.kind();

        let session = self.attestation.obtain_session(&self.enclave_name).await?;
        let nonce = NonceService::new(&self.transport).fetch(&session).await?;

        let request = call.into_request(&self.service_id, nonce, self.valid_from()?);
        let body = self.seal_request(&session, &request)?;

        tracing::debug!(
            operation = %kind,
            enclave = %session.enclave_id,
            "sending enclave request"
        );

        let raw = self.transport.send(EnclaveRequest::new(&session, body)).await?;
        Self::open_response(&session, raw)
    }

    /// Unix seconds, backdated by the configured skew.
    fn valid_from(&self) -> Result<u64, KeyBackupError> {
        let now = self
            .env
            .now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| KeyBackupError::assertion("system clock is before the unix epoch"))?;
        Ok(now.saturating_sub(self.valid_from_skew).as_secs())
    }

    fn seal_request(
        &self,
        session: &AttestationSession,
        request: &KeyBackupRequest,
    ) -> Result<EncryptedRequestBody, KeyBackupError> {
        let plaintext = Zeroizing::new(
            request.to_cbor().map_err(|e| KeyBackupError::assertion(e.to_string()))?,
        );
        let iv = self.env.random_array().map_err(|e| KeyBackupError::assertion(e.to_string()))?;

        let sealed = seal(&session.client_key, iv, &plaintext, &session.request_id)
            .map_err(|e| KeyBackupError::assertion(e.to_string()))?;

        let parts = SealedParts {
            iv: sealed.iv.to_vec(),
            ciphertext: sealed.ciphertext,
            mac: sealed.tag.to_vec(),
        };
        Ok(EncryptedRequestBody::new(request.kind(), &session.request_id, &parts))
    }

    fn open_response(
        session: &AttestationSession,
        raw: serde_json::Value,
    ) -> Result<KeyBackupResponse, KeyBackupError> {
        let body: EncryptedResponseBody = serde_json::from_value(raw)
            .map_err(|e| KeyBackupError::protocol(format!("malformed enclave response: {e}")))?;
        let parts = body.sealed().map_err(|e| KeyBackupError::protocol(e.to_string()))?;

        // Responses are not bound to the request id; the tag alone covers them.
        let plaintext = open(&session.server_key, &parts.iv, &parts.ciphertext, &parts.mac, &[])
            .map_err(|e| KeyBackupError::protocol(format!("cannot open enclave response: {e}")))?;

        KeyBackupResponse::from_cbor(&plaintext)
            .map_err(|e| KeyBackupError::protocol(e.to_string()))
    }
}
