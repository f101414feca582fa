//! Cryptographic error types.

use thiserror::Error;

/// Errors from derivation and envelope sealing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// HMAC or cipher rejected the key.
    #[error("invalid key length")]
    InvalidKeyLength,

    /// Byte string had the wrong size for the target type.
    #[error("invalid length for {what}: expected {expected}, got {actual}")]
    InvalidLength {
        /// What was being parsed.
        what: &'static str,
        /// Required size in bytes.
        expected: usize,
        /// Size that was provided.
        actual: usize,
    },

    /// AES-GCM encryption failed.
    #[error("encryption failed")]
    Seal,

    /// AES-GCM authentication failed.
    #[error("decryption failed")]
    Open,
}
