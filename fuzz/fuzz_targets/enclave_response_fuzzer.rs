//! Fuzz target for enclave response handling
//!
//! Everything the client reads back from the enclave frontend is attacker
//! controlled until the AEAD tag checks out, and the decrypted message is
//! only as trustworthy as the enclave.
//!
//! # Strategy
//!
//! - Raw JSON: arbitrary bytes parsed as nonce and encrypted response bodies
//! - Sealed CBOR: arbitrary bytes sealed with a known key, so the decoder and
//!   status interpretation see inputs that pass authentication
//! - Tag probing: arbitrary IV and tag lengths fed to `open`
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - A tampered ciphertext NEVER opens
//! - A decoded response is interpreted as a status or a protocol violation

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pinvault_client::status::{backup_outcome, delete_outcome, restore_outcome};
use pinvault_crypto::{open, seal};
use pinvault_proto::{EncryptedResponseBody, KeyBackupResponse, NonceResponseBody};

const KEY: [u8; 32] = [0x5A; 32];

#[derive(Debug, Arbitrary)]
enum Input {
    /// Frontend JSON for a nonce fetch.
    NonceJson(Vec<u8>),
    /// Frontend JSON for an enclave response.
    ResponseJson(Vec<u8>),
    /// Plaintext that the enclave sealed correctly.
    SealedCbor { iv: [u8; 12], plaintext: Vec<u8> },
    /// Raw open with arbitrary lengths.
    Open { iv: Vec<u8>, ciphertext: Vec<u8>, tag: Vec<u8> },
}

fn interpret(bytes: &[u8]) {
    let Ok(response) = KeyBackupResponse::from_cbor(bytes) else {
        return;
    };
    let _ = backup_outcome(response.clone());
    let _ = restore_outcome(response.clone());
    let _ = delete_outcome(response);
}

fuzz_target!(|input: Input| {
    match input {
        Input::NonceJson(bytes) => {
            if let Ok(body) = serde_json::from_slice::<NonceResponseBody>(&bytes) {
                let _ = body.backup_id();
                let _ = body.nonce();
            }
        },
        Input::ResponseJson(bytes) => {
            if let Ok(body) = serde_json::from_slice::<EncryptedResponseBody>(&bytes)
                && let Ok(parts) = body.sealed()
                && let Ok(plaintext) = open(&KEY, &parts.iv, &parts.ciphertext, &parts.mac, &[])
            {
                interpret(&plaintext);
            }
        },
        Input::SealedCbor { iv, plaintext } => {
            let Ok(sealed) = seal(&KEY, iv, &plaintext, &[]) else {
                return;
            };

            let opened = open(&KEY, &sealed.iv, &sealed.ciphertext, &sealed.tag, &[]);
            assert!(opened.is_ok_and(|p| *p == plaintext), "sealed payload must open");

            if !sealed.ciphertext.is_empty() {
                let mut tampered = sealed.ciphertext.clone();
                tampered[0] ^= 0x80;
                assert!(
                    open(&KEY, &sealed.iv, &tampered, &sealed.tag, &[]).is_err(),
                    "tampered ciphertext must not open"
                );
            }

            interpret(&plaintext);
        },
        Input::Open { iv, ciphertext, tag } => {
            let _ = open(&KEY, &iv, &ciphertext, &tag, &[]);
        },
    }
});
