//! Transport and attestation seams.
//!
//! Both are opaque to the client: their failures are passed through as
//! [`TransportError`] without interpretation, and retry or timeout policy is
//! theirs to own.

use std::sync::Arc;

use async_trait::async_trait;
use pinvault_proto::EncryptedRequestBody;
use thiserror::Error;

use crate::{AttestationSession, TransportAuth};

/// Unparsed JSON object returned by the enclave frontend.
pub type RawResponse = serde_json::Value;

/// Network-layer failures, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// Frontend answered with a non-success HTTP status.
    #[error("unexpected HTTP status {status}")]
    Http {
        /// HTTP status code.
        status: u16,
    },

    /// Attestation handshake failed.
    #[error("attestation failed: {0}")]
    Attestation(String),

    /// Connection-level failure.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Addressed, encrypted enclave request.
#[derive(Debug, Clone)]
pub struct EnclaveRequest {
    /// Target enclave instance.
    pub enclave_id: String,
    /// Frontend credentials.
    pub auth: TransportAuth,
    /// Attestation cookies.
    pub cookies: Vec<String>,
    /// JSON body.
    pub body: EncryptedRequestBody,
}

impl EnclaveRequest {
    /// Address a body using the session's routing and credentials.
    pub fn new(session: &AttestationSession, body: EncryptedRequestBody) -> Self {
        Self {
            enclave_id: session.enclave_id.clone(),
            auth: session.auth.clone(),
            cookies: session.cookies.clone(),
            body,
        }
    }
}

/// Request for a fresh backup id and nonce.
#[derive(Debug, Clone)]
pub struct NonceRequest {
    /// Target enclave instance.
    pub enclave_id: String,
    /// Frontend credentials.
    pub auth: TransportAuth,
    /// Attestation cookies.
    pub cookies: Vec<String>,
}

impl NonceRequest {
    /// Address a nonce fetch using the session's routing and credentials.
    pub fn new(session: &AttestationSession) -> Self {
        Self {
            enclave_id: session.enclave_id.clone(),
            auth: session.auth.clone(),
            cookies: session.cookies.clone(),
        }
    }
}

/// Produces attestation sessions.
#[async_trait]
pub trait AttestationProvider: Send + Sync {
    /// Run (or reuse) an attestation handshake with the named enclave.
    async fn obtain_session(&self, enclave_name: &str)
    -> Result<AttestationSession, TransportError>;
}

/// Carries requests to the enclave frontend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send an encrypted enclave request.
    async fn send(&self, request: EnclaveRequest) -> Result<RawResponse, TransportError>;

    /// Fetch a backup id and nonce.
    async fn send_nonce_request(&self, request: NonceRequest)
    -> Result<RawResponse, TransportError>;
}

#[async_trait]
impl<T: AttestationProvider + ?Sized> AttestationProvider for Arc<T> {
    async fn obtain_session(
        &self,
        enclave_name: &str,
    ) -> Result<AttestationSession, TransportError> {
        (**self).obtain_session(enclave_name).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: EnclaveRequest) -> Result<RawResponse, TransportError> {
        (**self).send(request).await
    }

    async fn send_nonce_request(
        &self,
        request: NonceRequest,
    ) -> Result<RawResponse, TransportError> {
        (**self).send_nonce_request(request).await
    }
}
