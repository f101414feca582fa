//! PIN-protected key backup client.
//!
//! A user's PIN is stretched and split into a locally derived half (PinKey1)
//! and a random server share (PinKey2) escrowed in a remote enclave. The
//! MasterKey is `HMAC(PinKey1, PinKey2)`; neither half alone reveals it.
//!
//! The client talks to the enclave over an attested session: every attempt
//! fetches a single-use nonce, seals a CBOR request with the session keys and
//! interprets the enclave's status. Successful backups and restores persist
//! the MasterKey and PinKey2 together in a local [`SecretStore`], and every
//! operation is serialized so the pair is never observed half-written.
//!
//! # Usage
//!
//! ```ignore
//! let client = KeyBackupClient::new(config, SystemEnv::new(), attestation, transport, store)?;
//!
//! client.generate_and_backup_keys("1234").await?;
//! assert!(client.verify_pin("1234").await);
//!
//! let token = client.derive_registration_lock_token().await;
//! ```
//!
//! [`SecretStore`]: pinvault_core::SecretStore

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod local_keys;
pub mod nonce;
pub mod status;

pub use client::KeyBackupClient;
pub use config::{ConfigError, KeyBackupConfig};
pub use envelope::{EnclaveCall, EnclaveEnvelope};
pub use error::KeyBackupError;
pub use local_keys::{LocalKeyStore, LocalKeys, MASTER_KEY_ENTRY, PIN_KEY2_ENTRY};
pub use nonce::{NonceMaterial, NonceService};
