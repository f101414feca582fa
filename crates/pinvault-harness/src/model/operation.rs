//! Operations for model-based testing.
//!
//! Operations are generated randomly by proptest and applied to both the
//! model and the real client talking to a [`SimEnclave`](crate::SimEnclave).

use arbitrary::Arbitrary;

/// PIN index. Maps to a small fixed set so generated sequences actually hit
/// matching PINs.
pub type ModelPin = u8;

/// Number of distinct PINs operations draw from.
pub const PIN_COUNT: u8 = 3;

/// Expand a [`ModelPin`] into the PIN string used by the real client.
pub fn pin_string(pin: ModelPin) -> String {
    format!("{:04}", u16::from(pin % PIN_COUNT) * 1111)
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Generate a fresh share and back it up under `pin`.
    Backup {
        /// PIN to protect the backup with.
        pin: ModelPin,
    },

    /// Restore the share with `pin`.
    Restore {
        /// PIN presented to the enclave.
        pin: ModelPin,
    },

    /// Restore while the enclave reports a stale nonce.
    StaleRestore {
        /// PIN presented to the enclave.
        pin: ModelPin,
    },

    /// Check `pin` against the local keys.
    Verify {
        /// PIN to check.
        pin: ModelPin,
    },

    /// Delete the backup and the local keys.
    Delete,

    /// Drop local keys without contacting the enclave.
    ClearLocal,
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// `Verify` answered.
    Verified(bool),

    /// Operation failed with an expected error.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Wrong PIN, with attempts left.
    InvalidPin(u32),

    /// No backup stored.
    BackupMissing,

    /// Nonce expired or consumed.
    StaleNonce,

    /// Anything else. Never expected from a well-behaved enclave.
    Unexpected(String),
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok | Self::Verified(_))
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_wrap_into_fixed_set() {
        assert_eq!(pin_string(0), "0000");
        assert_eq!(pin_string(1), "1111");
        assert_eq!(pin_string(2), "2222");
        assert_eq!(pin_string(3), "0000");
    }
}
