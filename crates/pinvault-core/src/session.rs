//! Attestation session handed over by the attestation provider.
//!
//! The handshake that produces it is not part of this workspace. The client
//! only consumes the resulting keys and identifiers, once per attempt.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Transport credentials for the enclave frontend.
///
/// # Security
///
/// - **Debug Redaction**: `password` is never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct TransportAuth {
    /// Frontend username.
    pub username: String,
    /// Frontend password.
    pub password: String,
}

impl std::fmt::Debug for TransportAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An established, key-exchanged channel to one enclave instance.
///
/// # Security
///
/// - **Debug Redaction**: both symmetric keys are never printed.
/// - Keys are zeroized when the session is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AttestationSession {
    /// Enclave instance the session is bound to.
    pub enclave_id: String,
    /// Opaque request id. AEAD associated data for outgoing requests.
    pub request_id: Vec<u8>,
    /// Key for client-to-enclave encryption.
    pub client_key: [u8; 32],
    /// Key for enclave-to-client encryption.
    pub server_key: [u8; 32],
    /// Frontend credentials.
    pub auth: TransportAuth,
    /// Cookies the frontend set during attestation.
    pub cookies: Vec<String>,
}

impl std::fmt::Debug for AttestationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationSession")
            .field("enclave_id", &self.enclave_id)
            .field("request_id", &format!("<{} bytes>", self.request_id.len()))
            .field("client_key", &"<redacted>")
            .field("server_key", &"<redacted>")
            .field("auth", &self.auth)
            .field("cookies", &self.cookies.len())
            .finish()
    }
}
