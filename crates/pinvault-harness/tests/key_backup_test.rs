//! End-to-end key backup tests against the simulated enclave.
//!
//! Each test wires a real `KeyBackupClient` to a `SimEnclave` and checks the
//! client's local state together with what the enclave saw.

use std::time::{Duration, UNIX_EPOCH};

use pinvault_client::{
    KeyBackupClient, KeyBackupConfig, KeyBackupError, MASTER_KEY_ENTRY, PIN_KEY2_ENTRY,
};
use pinvault_core::{MemorySecretStore, SecretStore};
use pinvault_crypto::{PinKey2, derive_master_key, derive_pin_key1, derive_stretched_pin};
use pinvault_harness::{Fault, SIM_EPOCH_SECS, SimEnclave, SimEnv};
use pinvault_proto::{RequestKind, RestoreStatus};

const ENCLAVE: &str = "sim-enclave";
const SERVICE_ID: &str = "aabbccdd";
const KEYCHAIN: &str = "KeyBackupService";

type SimClient = KeyBackupClient<SimEnv, SimEnclave, SimEnclave, MemorySecretStore>;

struct Setup {
    client: SimClient,
    env: SimEnv,
    enclave: SimEnclave,
    store: MemorySecretStore,
}

fn setup(seed: u64) -> Setup {
    let enclave = SimEnclave::new(ENCLAVE, vec![0xAA, 0xBB, 0xCC, 0xDD], seed);
    setup_with_store(seed, MemorySecretStore::new(), enclave)
}

fn setup_with_store(seed: u64, store: MemorySecretStore, enclave: SimEnclave) -> Setup {
    let env = SimEnv::with_seed(seed);
    let config = KeyBackupConfig::new(ENCLAVE, SERVICE_ID);
    let client =
        KeyBackupClient::new(config, env.clone(), enclave.clone(), enclave.clone(), store.clone())
            .expect("valid config");

    Setup { client, env, enclave, store }
}

fn stored_master_key(store: &MemorySecretStore) -> Option<Vec<u8>> {
    store.get(KEYCHAIN, MASTER_KEY_ENTRY).expect("memory store").map(|v| v.to_vec())
}

fn stored_pair(store: &MemorySecretStore) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
    let share = store.get(KEYCHAIN, PIN_KEY2_ENTRY).expect("memory store").map(|v| v.to_vec());
    (stored_master_key(store), share)
}

fn master_key_for(pin: &str, share: [u8; 32]) -> Vec<u8> {
    let pin_key1 = derive_pin_key1(&derive_stretched_pin(pin)).expect("pin key 1");
    let master_key = derive_master_key(&pin_key1, &PinKey2::from_bytes(share)).expect("master key");
    master_key.as_bytes().to_vec()
}

/// Write a local pair as if an earlier restore had stored it.
fn seed_local_pair(store: &MemorySecretStore, pin: &str, share: [u8; 32]) {
    store.set(KEYCHAIN, MASTER_KEY_ENTRY, &master_key_for(pin, share)).expect("seed master key");
    store.set(KEYCHAIN, PIN_KEY2_ENTRY, &share).expect("seed share");
}

#[tokio::test]
async fn backup_then_verify() {
    let Setup { client, enclave, .. } = setup(1);

    client.generate_and_backup_keys("1234").await.expect("backup");

    assert!(client.has_local_keys().await);
    assert!(client.verify_pin("1234").await);
    assert!(!client.verify_pin("0000").await);

    assert!(enclave.has_backup());
    assert_eq!(enclave.tries_remaining(), Some(10));
    assert_eq!(enclave.requests(), vec![RequestKind::Backup]);
}

#[tokio::test]
async fn restore_reproduces_backed_up_master_key() {
    let first = setup(2);
    first.client.generate_and_backup_keys("1234").await.expect("backup");
    let original = stored_master_key(&first.store).expect("master key stored");

    // A fresh install talking to the same enclave.
    let second = setup_with_store(3, MemorySecretStore::new(), first.enclave.clone());
    assert!(!second.client.has_local_keys().await);

    second.client.restore_keys("1234").await.expect("restore");

    assert_eq!(stored_master_key(&second.store), Some(original));
    assert!(second.client.verify_pin("1234").await);
}

#[tokio::test]
async fn restore_with_known_share() {
    let Setup { client, enclave, store, .. } = setup(4);
    enclave.seed_backup("1234", [0x42; 32], 10);

    client.restore_keys("1234").await.expect("restore");

    assert_eq!(stored_master_key(&store), Some(master_key_for("1234", [0x42; 32])));
    assert_eq!(
        client.derive_registration_lock_token().await.as_deref(),
        Some("7a80a78159ebc3f39cd9442e06f32f38a3bbda3e03fbcf8aba7420d3fe3fa4f9")
    );
}

#[tokio::test]
async fn delete_clears_both_sides() {
    let Setup { client, enclave, store, .. } = setup(5);
    client.generate_and_backup_keys("1234").await.expect("backup");

    client.delete_keys().await.expect("delete");

    assert!(!client.has_local_keys().await);
    assert!(!client.verify_pin("1234").await);
    assert!(store.is_empty());
    assert!(!enclave.has_backup());
    assert!(client.derive_registration_lock_token().await.is_none());
}

#[tokio::test]
async fn stale_nonce_leaves_local_state_unchanged() {
    let Setup { client, enclave, store, .. } = setup(6);
    client.generate_and_backup_keys("1234").await.expect("backup");
    let before = stored_master_key(&store);

    enclave.inject(Fault::RestoreStatus { status: RestoreStatus::NonceMismatch, tries: None });
    let err = client.restore_keys("1234").await.expect_err("stale nonce");

    assert!(matches!(err, KeyBackupError::StaleNonce));
    assert!(err.requires_fresh_nonce());
    assert_eq!(stored_master_key(&store), before);

    // The caller restarts the whole operation.
    client.restore_keys("1234").await.expect("retry with fresh nonce");
    assert_eq!(stored_master_key(&store), before);
}

#[tokio::test]
async fn wrong_pin_reports_tries_and_keeps_local_keys() {
    let Setup { client, enclave, store, .. } = setup(7);
    enclave.seed_backup("1234", [0x42; 32], 10);
    client.restore_keys("1234").await.expect("restore");
    let before = stored_master_key(&store);

    let err = client.restore_keys("9999").await.expect_err("wrong pin");

    assert!(matches!(err, KeyBackupError::InvalidPin { tries_remaining: 9 }));
    assert!(err.is_expected());
    assert_eq!(stored_master_key(&store), before);
    assert_eq!(enclave.tries_remaining(), Some(9));
}

#[tokio::test]
async fn forced_pin_mismatch_maps_tries_verbatim() {
    let Setup { client, enclave, store, .. } = setup(8);
    enclave.seed_backup("1234", [0x42; 32], 10);
    seed_local_pair(&store, "5678", [0x17; 32]);
    let before = stored_pair(&store);

    enclave.inject(Fault::RestoreStatus { status: RestoreStatus::PinMismatch, tries: Some(3) });
    let err = client.restore_keys("1234").await.expect_err("forced mismatch");

    assert!(matches!(err, KeyBackupError::InvalidPin { tries_remaining: 3 }));
    assert_eq!(stored_pair(&store), before);
    assert!(client.verify_pin("5678").await);
}

#[tokio::test]
async fn missing_backup() {
    let Setup { client, enclave, store, .. } = setup(9);
    seed_local_pair(&store, "1234", [0x42; 32]);
    let before = stored_pair(&store);

    let err = client.restore_keys("1234").await.expect_err("no backup");

    assert!(matches!(err, KeyBackupError::BackupMissing));
    assert!(!enclave.has_backup());
    assert_eq!(stored_pair(&store), before);
    assert!(client.has_local_keys().await);
    assert!(client.verify_pin("1234").await);
}

#[tokio::test]
async fn exhausting_tries_destroys_backup() {
    let Setup { client, enclave, .. } = setup(10);
    enclave.seed_backup("1234", [0x42; 32], 2);

    let first = client.restore_keys("0000").await.expect_err("first miss");
    assert!(matches!(first, KeyBackupError::InvalidPin { tries_remaining: 1 }));

    let second = client.restore_keys("0000").await.expect_err("second miss");
    assert!(matches!(second, KeyBackupError::InvalidPin { tries_remaining: 0 }));
    assert!(!enclave.has_backup());

    let third = client.restore_keys("1234").await.expect_err("backup gone");
    assert!(matches!(third, KeyBackupError::BackupMissing));
}

#[tokio::test]
async fn one_nonce_fetch_per_attempt() {
    let Setup { client, enclave, .. } = setup(11);

    client.generate_and_backup_keys("1234").await.expect("backup");
    let _ = client.restore_keys("0000").await;
    client.restore_keys("1234").await.expect("restore");
    client.delete_keys().await.expect("delete");

    // Verify and local queries never reach the network.
    assert!(!client.verify_pin("1234").await);
    assert!(!client.has_local_keys().await);

    assert_eq!(enclave.nonce_fetches(), 4);
    assert_eq!(
        enclave.requests(),
        vec![RequestKind::Backup, RequestKind::Restore, RequestKind::Restore, RequestKind::Delete]
    );
}

#[tokio::test]
async fn valid_from_is_backdated_one_day() {
    let Setup { client, enclave, .. } = setup(12);

    client.generate_and_backup_keys("1234").await.expect("backup");

    assert_eq!(enclave.last_valid_from(), Some(SIM_EPOCH_SECS - 86_400));
}

#[tokio::test]
async fn clock_far_ahead_is_clock_skew() {
    let Setup { client, env, enclave, store } = setup(13);
    env.advance(Duration::from_secs(2 * 86_400));

    let err = client.generate_and_backup_keys("1234").await.expect_err("future request");

    assert!(matches!(err, KeyBackupError::ClockSkew));
    assert!(store.is_empty());
    assert!(!enclave.has_backup());
}

#[tokio::test]
async fn enclave_clock_behind_is_clock_skew() {
    let Setup { client, enclave, store, .. } = setup(19);
    enclave.set_now(UNIX_EPOCH + Duration::from_secs(SIM_EPOCH_SECS - 2 * 86_400));

    let err = client.generate_and_backup_keys("1234").await.expect_err("enclave lags");

    assert!(matches!(err, KeyBackupError::ClockSkew));
    assert!(store.is_empty());

    enclave.set_now(UNIX_EPOCH + Duration::from_secs(SIM_EPOCH_SECS));
    client.generate_and_backup_keys("1234").await.expect("clocks agree again");
}

#[tokio::test]
async fn clock_before_epoch_is_assertion() {
    let Setup { client, env, enclave, store } = setup(20);
    env.set_now(UNIX_EPOCH - Duration::from_secs(1));

    let err = client.generate_and_backup_keys("1234").await.expect_err("clock before epoch");

    assert!(matches!(err, KeyBackupError::Assertion { .. }));
    assert!(err.is_fatal());
    assert!(store.is_empty());
    assert!(enclave.requests().is_empty());
}

#[tokio::test]
async fn clock_slightly_ahead_is_absorbed() {
    let Setup { client, env, .. } = setup(14);
    env.advance(Duration::from_secs(3_600));

    client.generate_and_backup_keys("1234").await.expect("within skew");
}

#[tokio::test]
async fn backup_replaces_previous_keys() {
    let Setup { client, enclave, store, .. } = setup(15);

    client.generate_and_backup_keys("1234").await.expect("first backup");
    let first = stored_master_key(&store);
    let first_share = enclave.stored_share();

    client.generate_and_backup_keys("5678").await.expect("second backup");

    assert_ne!(stored_master_key(&store), first);
    assert_ne!(enclave.stored_share(), first_share);
    assert!(client.verify_pin("5678").await);
    assert!(!client.verify_pin("1234").await);
}

#[tokio::test]
async fn concurrent_operations_never_expose_half_pair() {
    let Setup { client, store, .. } = setup(16);

    let (backup, _verify, delete) = tokio::join!(
        client.generate_and_backup_keys("1234"),
        client.verify_pin("1234"),
        client.delete_keys(),
    );
    backup.expect("backup");
    delete.expect("delete");

    // Whatever order the lane picked, the pair is all or nothing.
    assert!(store.len() == 0 || store.len() == 2);
    assert!(!client.has_local_keys().await || client.verify_pin("1234").await);
}

#[tokio::test]
async fn token_is_stable_and_hex() {
    let Setup { client, .. } = setup(17);
    assert!(client.derive_registration_lock_token().await.is_none());

    client.generate_and_backup_keys("1234").await.expect("backup");

    let token = client.derive_registration_lock_token().await.expect("token");
    assert_eq!(token.len(), 64);
    assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
    assert_eq!(client.derive_registration_lock_token().await, Some(token));
}

#[tokio::test]
async fn wrong_enclave_name_fails_attestation() {
    let enclave = SimEnclave::new("other-enclave", vec![0xAA, 0xBB, 0xCC, 0xDD], 18);
    let Setup { client, store, .. } = setup_with_store(18, MemorySecretStore::new(), enclave);

    let err = client.generate_and_backup_keys("1234").await.expect_err("attestation");

    assert!(matches!(err, KeyBackupError::Transport(_)));
    assert!(store.is_empty());
}
