//! Protocol error types.

use thiserror::Error;

/// Errors from encoding or decoding protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// CBOR encoding failed.
    #[error("CBOR encode failed: {0}")]
    Encode(String),

    /// CBOR decoding failed (truncated, wrong shape, unknown status value).
    #[error("CBOR decode failed: {0}")]
    Decode(String),

    /// A base64 field in a wire body could not be decoded.
    #[error("invalid base64 in field `{field}`")]
    Base64 {
        /// Name of the offending JSON field.
        field: &'static str,
    },
}
