//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples protocol logic from system resources
//! (wall clock, randomness). This enables:
//!
//! - Deterministic Simulation: a seeded RNG and a settable clock make every
//!   generated share and IV reproducible.
//!
//! - Production Runtime: [`SystemEnv`](crate::SystemEnv) uses the OS clock
//!   and entropy pool without any change to the protocol logic.
//!
//! # Invariants
//!
//! - Determinism: Given the same seed, `fill_random()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::SystemTime;

use thiserror::Error;

/// The entropy source could not deliver bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("entropy source failed: {0}")]
pub struct EntropyError(pub String);

/// Abstract environment providing wall-clock time and randomness.
///
/// # Security
///
/// Production implementations MUST use cryptographically secure entropy.
/// Server shares and AES-GCM IVs are drawn from `fill_random()`; an
/// implementation that cannot produce entropy must return an error rather
/// than fall back to a fixed pattern.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time.
    ///
    /// Used for the `valid_from` field of enclave requests, so it must track
    /// real time rather than a monotonic counter.
    fn now(&self) -> SystemTime;

    /// Fills the provided buffer with random bytes.
    fn fill_random(&self, buffer: &mut [u8]) -> Result<(), EntropyError>;

    /// Random fixed-size array.
    fn random_array<const N: usize>(&self) -> Result<[u8; N], EntropyError> {
        let mut bytes = [0u8; N];
        self.fill_random(&mut bytes)?;
        Ok(bytes)
    }
}
