//! Client error types.

use pinvault_core::{StoreError, TransportError};
use thiserror::Error;

/// Errors from key backup operations.
///
/// `InvalidPin`, `BackupMissing`, `StaleNonce`, `ClockSkew` and `Transport`
/// are expected outcomes the caller must handle. The remaining variants mean
/// something that should never happen did, and the attempt is abandoned.
#[derive(Debug, Error)]
pub enum KeyBackupError {
    /// The enclave rejected the PIN.
    #[error("invalid PIN: {tries_remaining} attempts remaining")]
    InvalidPin {
        /// Attempts left before the enclave destroys the backup. Authoritative.
        tries_remaining: u32,
    },

    /// No backup exists for this account.
    #[error("no backup exists for this account")]
    BackupMissing,

    /// The nonce expired or was already consumed.
    ///
    /// The caller may restart the whole operation, which fetches a new one.
    #[error("nonce expired or already consumed")]
    StaleNonce,

    /// The enclave considers `valid_from` to be in the future.
    #[error("request not yet valid: device clock is ahead of the enclave")]
    ClockSkew,

    /// Network or attestation failure, passed through verbatim.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The enclave or its frontend sent something malformed or incomplete.
    #[error("protocol violation: {reason}")]
    ProtocolViolation {
        /// Description of the violation.
        reason: String,
    },

    /// A local invariant failed.
    #[error("assertion failed: {reason}")]
    Assertion {
        /// Description of the failed invariant.
        reason: String,
    },

    /// The local secret store failed.
    #[error("secret store error: {0}")]
    Storage(#[from] StoreError),
}

impl KeyBackupError {
    /// Build a [`KeyBackupError::ProtocolViolation`], logging it.
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::error!(%reason, "enclave protocol violation");
        Self::ProtocolViolation { reason }
    }

    /// Build a [`KeyBackupError::Assertion`], logging it.
    pub(crate) fn assertion(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::error!(%reason, "key backup assertion failed");
        Self::Assertion { reason }
    }

    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Fatal errors indicate protocol violations or local bugs.
    /// Expected errors can be handled by the caller.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ProtocolViolation { .. } | Self::Assertion { .. } | Self::Storage(_) => true,

            Self::InvalidPin { .. }
            | Self::BackupMissing
            | Self::StaleNonce
            | Self::ClockSkew
            | Self::Transport(_) => false,
        }
    }

    /// Returns true for outcomes a caller is expected to handle explicitly.
    pub fn is_expected(&self) -> bool {
        !self.is_fatal()
    }

    /// Returns true if restarting the whole operation may succeed.
    ///
    /// No retry happens inside the client.
    pub fn requires_fresh_nonce(&self) -> bool {
        matches!(self, Self::StaleNonce)
    }
}
