//! Pinvault protocol messages.
//!
//! Typed messages exchanged with the key backup enclave, and the JSON bodies
//! that carry them over the attested channel.
//!
//! # Layers
//!
//! ```text
//! JSON body        { requestId, iv, data, mac, type }     (wire)
//!   └─ AES-GCM     ciphertext of the CBOR outer message     (pinvault-crypto)
//!        └─ CBOR   KeyBackupRequest::{Backup,Restore,Delete} (envelope)
//!             └─   BackupRequest / RestoreRequest / ...      (payloads)
//! ```
//!
//! This crate only defines shapes and the CBOR codec. Encryption lives in
//! `pinvault-crypto` and the exchange itself in `pinvault-client`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod envelope;
pub mod error;
pub mod payloads;
pub mod wire;

pub use envelope::{KeyBackupRequest, KeyBackupResponse, RequestKind};
pub use error::ProtoError;
pub use payloads::{
    backup::{BackupRequest, BackupResponse, BackupStatus},
    delete::{DeleteRequest, DeleteResponse},
    restore::{RestoreRequest, RestoreResponse, RestoreStatus},
};
pub use wire::{EncryptedRequestBody, EncryptedResponseBody, NonceResponseBody, SealedParts};
