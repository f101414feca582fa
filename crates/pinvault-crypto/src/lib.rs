//! Pinvault Cryptographic Primitives
//!
//! This crate provides the key derivation chain that turns a PIN and a
//! server-held share into a master key, and the AES-GCM sealing used for the
//! enclave envelope.
//!
//! # Design
//!
//! All functions in this crate are pure - they have no side effects and
//! produce deterministic outputs given the same inputs. Random bytes required
//! for the server share and for IVs must be provided by the caller, enabling:
//!
//! - Deterministic testing with seeded RNG
//! - Sans-IO architecture compatibility
//! - No coupling to application-level abstractions
//!
//! # Derivation Chain
//!
//! ```text
//! PIN ──PBKDF2("nosalt", 20000)──▶ StretchedPin
//!                                     │ HMAC("Master Key Encryption")
//!                                     ▼
//!                                   PinKey1 ──HMAC(msg = PinKey2)──▶ MasterKey
//!                                                                      │
//!                                     HMAC("Registration Lock") ◀──────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod kdf;
pub mod seal;

pub use error::CryptoError;
pub use kdf::{
    KEY_SIZE, MasterKey, PIN_STRETCH_ITERATIONS, PinKey1, PinKey2, StretchedPin,
    derive_master_key, derive_pin_key1, derive_registration_lock_token, derive_stretched_pin,
    generate_pin_key2,
};
pub use seal::{IV_SIZE, Sealed, TAG_SIZE, open, seal};
