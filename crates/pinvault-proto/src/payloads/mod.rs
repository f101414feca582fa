//! Inner request/response payloads, one module per enclave operation.
//!
//! Byte fields that carry PIN material or the server share have hand-written
//! `Debug` impls that print only their length.

pub mod backup;
pub mod delete;
pub mod restore;

/// Debug placeholder for secret byte fields.
pub(crate) fn redacted(bytes: &[u8]) -> String {
    format!("<redacted {} bytes>", bytes.len())
}
