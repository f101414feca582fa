//! Reference model for model-based testing.
//!
//! The model captures the observable behavior of one account (enclave backup
//! plus local key pair) with no cryptography. It is the oracle the real
//! client and [`SimEnclave`](crate::SimEnclave) are checked against.

pub mod operation;
mod vault;

pub use operation::{ModelPin, Operation, OperationError, OperationResult, PIN_COUNT, pin_string};
pub use vault::{ModelVault, ObservableState, ShareId};
