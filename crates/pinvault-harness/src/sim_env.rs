//! Deterministic environment for simulation.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use pinvault_core::{EntropyError, Environment};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Wall-clock start of every simulation (2023-11-14T22:13:20Z).
pub const SIM_EPOCH_SECS: u64 = 1_700_000_000;

#[derive(Debug)]
struct SimEnvState {
    rng: ChaCha20Rng,
    now: SystemTime,
}

/// Seeded RNG and settable clock.
///
/// Clones share both, so a test can hold a handle and move time while the
/// client under test owns another.
#[derive(Debug, Clone)]
pub struct SimEnv {
    state: Arc<Mutex<SimEnvState>>,
}

impl SimEnv {
    /// Environment seeded with zero.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment with the given RNG seed, clock at [`SIM_EPOCH_SECS`].
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimEnvState {
                rng: ChaCha20Rng::seed_from_u64(seed),
                now: UNIX_EPOCH + Duration::from_secs(SIM_EPOCH_SECS),
            })),
        }
    }

    /// Set the clock.
    pub fn set_now(&self, now: SystemTime) {
        self.lock().now = now;
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimEnvState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> SystemTime {
        self.lock().now
    }

    fn fill_random(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        self.lock().rng.fill_bytes(buffer);
        Ok(())
    }
}
