//! Pinvault core seams.
//!
//! Everything the key backup client needs from the outside world is expressed
//! here as a trait, so production wiring and deterministic tests plug in the
//! same way:
//!
//! - [`Environment`]: wall clock and CSPRNG
//! - [`AttestationProvider`]: yields an [`AttestationSession`] per attempt
//! - [`Transport`]: carries nonce and enclave requests
//! - [`SecretStore`]: durable local storage for the key pair

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod session;
pub mod store;
pub mod system_env;
pub mod transport;

pub use env::{EntropyError, Environment};
pub use session::{AttestationSession, TransportAuth};
pub use store::{MemorySecretStore, SecretStore, StoreError};
pub use system_env::SystemEnv;
pub use transport::{
    AttestationProvider, EnclaveRequest, NonceRequest, RawResponse, Transport, TransportError,
};
