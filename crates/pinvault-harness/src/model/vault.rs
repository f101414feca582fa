//! Reference model of one account: enclave backup plus local key pair.

use super::operation::{ModelPin, Operation, OperationError, OperationResult, PIN_COUNT};

/// Shares are identified by the order they were generated in.
pub type ShareId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ModelBackup {
    pin: ModelPin,
    share: ShareId,
    tries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ModelLocal {
    pin: ModelPin,
    share: ShareId,
}

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Whether a complete local key pair is stored.
    pub has_local_keys: bool,
    /// Whether the enclave holds a backup.
    pub backup_exists: bool,
    /// Attempts left on the backup.
    pub tries_remaining: Option<u32>,
}

/// Reference implementation of the key backup client and enclave together.
#[derive(Debug, Clone)]
pub struct ModelVault {
    max_tries: u32,
    next_share: ShareId,
    backup: Option<ModelBackup>,
    local: Option<ModelLocal>,
}

impl ModelVault {
    /// Empty account whose backups allow `max_tries` PIN attempts.
    pub fn new(max_tries: u32) -> Self {
        Self { max_tries, next_share: 0, backup: None, local: None }
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::Backup { pin } => self.apply_backup(pin % PIN_COUNT),
            Operation::Restore { pin } => self.apply_restore(pin % PIN_COUNT),
            Operation::StaleRestore { .. } => OperationResult::Error(OperationError::StaleNonce),
            Operation::Verify { pin } => OperationResult::Verified(
                self.local.as_ref().is_some_and(|local| local.pin == pin % PIN_COUNT),
            ),
            Operation::Delete => {
                self.backup = None;
                self.local = None;
                OperationResult::Ok
            },
            Operation::ClearLocal => {
                self.local = None;
                OperationResult::Ok
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            has_local_keys: self.local.is_some(),
            backup_exists: self.backup.is_some(),
            tries_remaining: self.backup.as_ref().map(|b| b.tries),
        }
    }

    /// Whether the local pair was built from the share currently backed up.
    pub fn local_matches_backup(&self) -> bool {
        match (&self.local, &self.backup) {
            (Some(local), Some(backup)) => local.share == backup.share,
            _ => false,
        }
    }

    fn apply_backup(&mut self, pin: ModelPin) -> OperationResult {
        let share = self.next_share;
        self.next_share += 1;

        self.backup = Some(ModelBackup { pin, share, tries: self.max_tries });
        self.local = Some(ModelLocal { pin, share });
        OperationResult::Ok
    }

    fn apply_restore(&mut self, pin: ModelPin) -> OperationResult {
        let Some(backup) = self.backup.as_mut() else {
            return OperationResult::Error(OperationError::BackupMissing);
        };

        if backup.pin == pin {
            backup.tries = self.max_tries;
            self.local = Some(ModelLocal { pin, share: backup.share });
            return OperationResult::Ok;
        }

        backup.tries = backup.tries.saturating_sub(1);
        let tries = backup.tries;
        if tries == 0 {
            self.backup = None;
        }
        OperationResult::Error(OperationError::InvalidPin(tries))
    }
}
