//! Deterministic simulation harness for the key backup client.
//!
//! In-process implementations of every collaborator the client takes:
//!
//! - [`SimEnv`]: seeded RNG and settable clock
//! - [`SimEnclave`]: attestation provider, transport and enclave in one, with
//!   one-shot [`Fault`] injection
//! - [`FlakySecretStore`]: in-memory secret store that fails on command
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation. Operations are
//! applied to both the model and the real client, and their results and
//! observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod flaky_store;
pub mod model;
pub mod sim_enclave;
pub mod sim_env;

pub use flaky_store::FlakySecretStore;
pub use model::{
    ModelPin, ModelVault, ObservableState, Operation, OperationError, OperationResult, pin_string,
};
pub use sim_enclave::{Fault, SimEnclave};
pub use sim_env::{SIM_EPOCH_SECS, SimEnv};
