//! Production Environment implementation using system time and RNG.

use std::time::SystemTime;

use crate::env::{EntropyError, Environment};

/// Production environment using the system clock and `getrandom`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn fill_random(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        getrandom::fill(buffer).map_err(|e| {
            tracing::error!(error = %e, "getrandom failed");
            EntropyError(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;

    #[test]
    fn system_env_clock_is_after_epoch() {
        let env = SystemEnv::new();
        assert!(env.now().duration_since(UNIX_EPOCH).is_ok());
    }

    #[test]
    fn system_env_random_bytes_are_random() {
        let env = SystemEnv::new();

        let bytes1: [u8; 32] = env.random_array().expect("entropy");
        let bytes2: [u8; 32] = env.random_array().expect("entropy");

        // Extremely unlikely to be equal if random
        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[test]
    fn system_env_random_bytes_fills_buffer() {
        let env = SystemEnv::new();

        let mut bytes = [0u8; 64];
        env.fill_random(&mut bytes).expect("entropy");

        // Check that at least some bytes are non-zero
        let non_zero_count = bytes.iter().filter(|&&b| b != 0).count();
        assert!(non_zero_count > 32, "Most bytes should be non-zero");
    }
}
