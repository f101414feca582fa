//! Enclave status interpretation.
//!
//! Each function takes the decrypted outer response, extracts the slot for
//! its operation and maps the status to a result:
//!
//! | status          | result                        |
//! |-----------------|-------------------------------|
//! | `Ok`            | operation payload             |
//! | `PinMismatch`   | `InvalidPin(tries)`           |
//! | `Missing`       | `BackupMissing` (restore only)|
//! | `NonceMismatch` | `StaleNonce`                  |
//! | `NotYetValid`   | `ClockSkew`                   |
//! | absent          | `ProtocolViolation`           |

use pinvault_crypto::PinKey2;
use pinvault_proto::{BackupStatus, KeyBackupResponse, RestoreStatus};

use crate::KeyBackupError;

/// Interpret a backup response.
pub fn backup_outcome(response: KeyBackupResponse) -> Result<(), KeyBackupError> {
    let backup = response
        .backup
        .ok_or_else(|| KeyBackupError::protocol("response has no backup message"))?;

    match backup.status {
        Some(BackupStatus::Ok) => Ok(()),
        Some(BackupStatus::NonceMismatch) => Err(KeyBackupError::StaleNonce),
        Some(BackupStatus::NotYetValid) => Err(KeyBackupError::ClockSkew),
        None => Err(KeyBackupError::protocol("backup response has no status")),
    }
}

/// Interpret a restore response, yielding the server share on success.
pub fn restore_outcome(response: KeyBackupResponse) -> Result<PinKey2, KeyBackupError> {
    let restore = response
        .restore
        .ok_or_else(|| KeyBackupError::protocol("response has no restore message"))?;

    match restore.status {
        Some(RestoreStatus::Ok) => {
            let data = restore
                .data
                .ok_or_else(|| KeyBackupError::protocol("restore response has no data"))?;
            PinKey2::from_slice(&data).map_err(|e| KeyBackupError::protocol(e.to_string()))
        },
        Some(RestoreStatus::PinMismatch) => {
            let tries_remaining = restore
                .tries
                .ok_or_else(|| KeyBackupError::protocol("pin mismatch without tries"))?;
            Err(KeyBackupError::InvalidPin { tries_remaining })
        },
        Some(RestoreStatus::Missing) => Err(KeyBackupError::BackupMissing),
        Some(RestoreStatus::NonceMismatch) => Err(KeyBackupError::StaleNonce),
        Some(RestoreStatus::NotYetValid) => Err(KeyBackupError::ClockSkew),
        None => Err(KeyBackupError::protocol("restore response has no status")),
    }
}

/// Interpret a delete response. The slot carries no status; its presence is
/// the success signal.
pub fn delete_outcome(response: KeyBackupResponse) -> Result<(), KeyBackupError> {
    response
        .delete
        .map(|_| ())
        .ok_or_else(|| KeyBackupError::protocol("response has no delete message"))
}
