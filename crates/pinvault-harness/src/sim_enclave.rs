//! In-process enclave and attestation frontend.
//!
//! `SimEnclave` plays both external roles the client depends on: it hands out
//! attestation sessions and answers nonce and enclave requests. It keeps the
//! server-side rules the client relies on:
//!
//! - one outstanding nonce per backup id, consumed by the next request
//! - requests dated in the future (`valid_from > now`) are rejected
//! - each PIN mismatch costs one attempt; the backup is destroyed at zero
//! - requests are opened with the session's client key, request id as AAD;
//!   responses are sealed with the server key and no AAD
//!
//! One-shot [`Fault`]s let tests force statuses or break the wire.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use pinvault_core::{
    AttestationProvider, AttestationSession, EnclaveRequest, NonceRequest, RawResponse, Transport,
    TransportAuth, TransportError,
};
use pinvault_crypto::{derive_stretched_pin, open, seal};
use pinvault_proto::{
    BackupRequest, BackupResponse, BackupStatus, DeleteRequest, DeleteResponse,
    EncryptedResponseBody, KeyBackupRequest, KeyBackupResponse, NonceResponseBody, RequestKind,
    RestoreRequest, RestoreResponse, RestoreStatus, SealedParts,
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::sim_env::SIM_EPOCH_SECS;

/// Injected misbehavior, consumed by the first request it applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// Answer the next backup with this status without storing anything.
    BackupStatus(BackupStatus),
    /// Answer the next restore with this status and tries, touching nothing.
    RestoreStatus {
        /// Status to report.
        status: RestoreStatus,
        /// Tries to report alongside it.
        tries: Option<u32>,
    },
    /// Fail the next attestation handshake.
    AttestationFailure(TransportError),
    /// Fail the next nonce fetch.
    NonceFailure(TransportError),
    /// Answer the next nonce fetch with this raw body.
    NonceBody(RawResponse),
    /// Fail the next enclave request after it was processed.
    TransportFailure(TransportError),
    /// Answer the next enclave request with this raw body.
    ResponseBody(RawResponse),
    /// Seal an outer response with no message for the requested operation.
    DropInnerResponse,
    /// Flip a bit in the next response tag.
    CorruptMac,
}

/// Server-side copy of one backup.
#[derive(Debug, Clone)]
struct StoredBackup {
    pin: Vec<u8>,
    data: Vec<u8>,
    tries: u32,
    max_tries: u32,
}

#[derive(Debug, Clone)]
struct SessionKeys {
    client_key: [u8; 32],
    server_key: [u8; 32],
}

#[derive(Debug)]
struct EnclaveState {
    rng: ChaCha20Rng,
    now: SystemTime,
    enclave_name: String,
    service_id: Vec<u8>,
    backup_id: Vec<u8>,
    pending_nonce: Option<Vec<u8>>,
    backup: Option<StoredBackup>,
    sessions: HashMap<Vec<u8>, SessionKeys>,
    faults: VecDeque<Fault>,
    nonce_fetches: usize,
    requests: Vec<RequestKind>,
    last_valid_from: Option<u64>,
}

impl EnclaveState {
    fn random<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.rng.fill_bytes(&mut bytes);
        bytes
    }

    fn take_fault(&mut self, applies: impl Fn(&Fault) -> bool) -> Option<Fault> {
        let index = self.faults.iter().position(applies)?;
        self.faults.remove(index)
    }

    fn now_secs(&self) -> u64 {
        self.now.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
    }

    /// Consume the outstanding nonce. True if `nonce` and `backup_id` match.
    fn consume_nonce(&mut self, backup_id: &[u8], nonce: &[u8]) -> bool {
        let pending = self.pending_nonce.take();
        backup_id == self.backup_id.as_slice() && pending.as_deref() == Some(nonce)
    }

    fn handle_backup(&mut self, request: &BackupRequest) -> KeyBackupResponse {
        let status = if let Some(Fault::BackupStatus(status)) =
            self.take_fault(|f| matches!(f, Fault::BackupStatus(_)))
        {
            self.pending_nonce = None;
            status
        } else if !self.consume_nonce(&request.backup_id, &request.nonce) {
            BackupStatus::NonceMismatch
        } else if request.valid_from > self.now_secs() {
            BackupStatus::NotYetValid
        } else {
            self.backup = Some(StoredBackup {
                pin: request.pin.clone(),
                data: request.data.clone(),
                tries: request.tries,
                max_tries: request.tries,
            });
            BackupStatus::Ok
        };

        KeyBackupResponse {
            backup: Some(BackupResponse { status: Some(status), nonce: None }),
            ..KeyBackupResponse::default()
        }
    }

    fn handle_restore(&mut self, request: &RestoreRequest) -> KeyBackupResponse {
        let restore = if let Some(Fault::RestoreStatus { status, tries }) =
            self.take_fault(|f| matches!(f, Fault::RestoreStatus { .. }))
        {
            self.pending_nonce = None;
            let data = (status == RestoreStatus::Ok)
                .then(|| self.backup.as_ref().map(|b| b.data.clone()))
                .flatten();
            RestoreResponse { status: Some(status), nonce: None, data, tries }
        } else if !self.consume_nonce(&request.backup_id, &request.nonce) {
            Self::restore_status(RestoreStatus::NonceMismatch, None)
        } else if request.valid_from > self.now_secs() {
            Self::restore_status(RestoreStatus::NotYetValid, None)
        } else {
            self.check_pin(&request.pin)
        };

        KeyBackupResponse { restore: Some(restore), ..KeyBackupResponse::default() }
    }

    fn check_pin(&mut self, pin: &[u8]) -> RestoreResponse {
        let Some(backup) = self.backup.as_mut() else {
            return Self::restore_status(RestoreStatus::Missing, None);
        };

        if backup.pin == pin {
            backup.tries = backup.max_tries;
            return RestoreResponse {
                status: Some(RestoreStatus::Ok),
                nonce: None,
                data: Some(backup.data.clone()),
                tries: Some(backup.tries),
            };
        }

        backup.tries = backup.tries.saturating_sub(1);
        let tries = backup.tries;
        if tries == 0 {
            self.backup = None;
        }
        Self::restore_status(RestoreStatus::PinMismatch, Some(tries))
    }

    fn restore_status(status: RestoreStatus, tries: Option<u32>) -> RestoreResponse {
        RestoreResponse { status: Some(status), nonce: None, data: None, tries }
    }

    fn handle_delete(&mut self, request: &DeleteRequest) -> KeyBackupResponse {
        if request.backup_id == self.backup_id {
            self.backup = None;
        }
        self.pending_nonce = None;
        KeyBackupResponse { delete: Some(DeleteResponse {}), ..KeyBackupResponse::default() }
    }
}

/// Simulated enclave. Clones share state.
#[derive(Debug, Clone)]
pub struct SimEnclave {
    state: Arc<Mutex<EnclaveState>>,
}

impl SimEnclave {
    /// Enclave named `enclave_name` accepting requests for `service_id`.
    pub fn new(enclave_name: impl Into<String>, service_id: Vec<u8>, seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut backup_id = vec![0u8; 32];
        rng.fill_bytes(&mut backup_id);

        Self {
            state: Arc::new(Mutex::new(EnclaveState {
                rng,
                now: UNIX_EPOCH + Duration::from_secs(SIM_EPOCH_SECS),
                enclave_name: enclave_name.into(),
                service_id,
                backup_id,
                pending_nonce: None,
                backup: None,
                sessions: HashMap::new(),
                faults: VecDeque::new(),
                nonce_fetches: 0,
                requests: Vec::new(),
                last_valid_from: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EnclaveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a one-shot fault.
    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push_back(fault);
    }

    /// Faults not yet consumed.
    pub fn pending_faults(&self) -> usize {
        self.lock().faults.len()
    }

    /// Set the enclave's clock.
    pub fn set_now(&self, now: SystemTime) {
        self.lock().now = now;
    }

    /// Store a backup directly, as if an earlier install had made it.
    pub fn seed_backup(&self, pin: &str, pin_key2: [u8; 32], tries: u32) {
        let stretched = derive_stretched_pin(pin);
        self.lock().backup = Some(StoredBackup {
            pin: stretched.as_bytes().to_vec(),
            data: pin_key2.to_vec(),
            tries,
            max_tries: tries,
        });
    }

    /// Whether a backup is stored.
    pub fn has_backup(&self) -> bool {
        self.lock().backup.is_some()
    }

    /// Attempts left on the stored backup.
    pub fn tries_remaining(&self) -> Option<u32> {
        self.lock().backup.as_ref().map(|b| b.tries)
    }

    /// Server share held in the stored backup.
    pub fn stored_share(&self) -> Option<Vec<u8>> {
        self.lock().backup.as_ref().map(|b| b.data.clone())
    }

    /// Number of nonce fetches served.
    pub fn nonce_fetches(&self) -> usize {
        self.lock().nonce_fetches
    }

    /// Operations of every enclave request received, in order.
    pub fn requests(&self) -> Vec<RequestKind> {
        self.lock().requests.clone()
    }

    /// `valid_from` of the latest backup or restore request.
    pub fn last_valid_from(&self) -> Option<u64> {
        self.lock().last_valid_from
    }

    fn process(
        state: &mut EnclaveState,
        request: &EnclaveRequest,
    ) -> Result<KeyBackupResponse, TransportError> {
        let request_id = request
            .body
            .request_id()
            .map_err(|_| TransportError::Http { status: 400 })?;
        let keys = state
            .sessions
            .get(&request_id)
            .cloned()
            .ok_or(TransportError::Http { status: 401 })?;
        let parts = request.body.sealed().map_err(|_| TransportError::Http { status: 400 })?;

        let plaintext =
            open(&keys.client_key, &parts.iv, &parts.ciphertext, &parts.mac, &request_id)
                .map_err(|_| TransportError::Http { status: 400 })?;
        let decoded = KeyBackupRequest::from_cbor(&plaintext)
            .map_err(|_| TransportError::Http { status: 400 })?;

        if decoded.kind() != request.body.kind {
            return Err(TransportError::Http { status: 400 });
        }
        state.requests.push(decoded.kind());

        let response = match &decoded {
            KeyBackupRequest::Backup(backup) => {
                state.last_valid_from = Some(backup.valid_from);
                if backup.service_id != state.service_id {
                    return Err(TransportError::Http { status: 404 });
                }
                state.handle_backup(backup)
            },
            KeyBackupRequest::Restore(restore) => {
                state.last_valid_from = Some(restore.valid_from);
                if restore.service_id != state.service_id {
                    return Err(TransportError::Http { status: 404 });
                }
                state.handle_restore(restore)
            },
            KeyBackupRequest::Delete(delete) => {
                if delete.service_id != state.service_id {
                    return Err(TransportError::Http { status: 404 });
                }
                state.handle_delete(delete)
            },
        };

        Ok(response)
    }

    fn seal_response(
        state: &mut EnclaveState,
        server_key: &[u8; 32],
        response: &KeyBackupResponse,
    ) -> Result<RawResponse, TransportError> {
        let plaintext = response.to_cbor().map_err(|e| TransportError::Connection(e.to_string()))?;
        let iv = state.random();
        let sealed = seal(server_key, iv, &plaintext, &[])
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let mut parts = SealedParts {
            iv: sealed.iv.to_vec(),
            ciphertext: sealed.ciphertext,
            mac: sealed.tag.to_vec(),
        };
        if state.take_fault(|f| matches!(f, Fault::CorruptMac)).is_some()
            && let Some(first) = parts.mac.first_mut()
        {
            *first ^= 0x01;
        }

        serde_json::to_value(EncryptedResponseBody::new(&parts))
            .map_err(|e| TransportError::Connection(e.to_string()))
    }
}

#[async_trait]
impl AttestationProvider for SimEnclave {
    async fn obtain_session(
        &self,
        enclave_name: &str,
    ) -> Result<AttestationSession, TransportError> {
        let mut state = self.lock();

        if let Some(Fault::AttestationFailure(e)) =
            state.take_fault(|f| matches!(f, Fault::AttestationFailure(_)))
        {
            return Err(e);
        }
        if enclave_name != state.enclave_name {
            return Err(TransportError::Attestation(format!("unknown enclave {enclave_name}")));
        }

        let request_id = state.random::<16>().to_vec();
        let keys = SessionKeys { client_key: state.random(), server_key: state.random() };
        state.sessions.insert(request_id.clone(), keys.clone());

        Ok(AttestationSession {
            enclave_id: state.enclave_name.clone(),
            request_id,
            client_key: keys.client_key,
            server_key: keys.server_key,
            auth: TransportAuth {
                username: "sim-user".to_string(),
                password: "sim-pass".to_string(),
            },
            cookies: vec!["session=sim".to_string()],
        })
    }
}

#[async_trait]
impl Transport for SimEnclave {
    async fn send(&self, request: EnclaveRequest) -> Result<RawResponse, TransportError> {
        let mut state = self.lock();

        if request.enclave_id != state.enclave_name {
            return Err(TransportError::Http { status: 404 });
        }

        let mut response = Self::process(&mut state, &request)?;

        if let Some(fault) = state.take_fault(|f| {
            matches!(
                f,
                Fault::TransportFailure(_) | Fault::ResponseBody(_) | Fault::DropInnerResponse
            )
        }) {
            match fault {
                Fault::TransportFailure(e) => return Err(e),
                Fault::ResponseBody(body) => return Ok(body),
                _ => response = KeyBackupResponse::default(),
            }
        }

        let request_id =
            request.body.request_id().map_err(|_| TransportError::Http { status: 400 })?;
        let server_key = state
            .sessions
            .get(&request_id)
            .map(|keys| keys.server_key)
            .ok_or(TransportError::Http { status: 401 })?;

        Self::seal_response(&mut state, &server_key, &response)
    }

    async fn send_nonce_request(
        &self,
        request: NonceRequest,
    ) -> Result<RawResponse, TransportError> {
        let mut state = self.lock();

        if request.enclave_id != state.enclave_name {
            return Err(TransportError::Http { status: 404 });
        }
        state.nonce_fetches += 1;

        match state.take_fault(|f| matches!(f, Fault::NonceFailure(_) | Fault::NonceBody(_))) {
            Some(Fault::NonceFailure(e)) => return Err(e),
            Some(Fault::NonceBody(body)) => return Ok(body),
            _ => {},
        }

        let nonce = state.random::<32>().to_vec();
        state.pending_nonce = Some(nonce.clone());
        let tries = state.backup.as_ref().map_or(0, |b| b.tries);

        serde_json::to_value(NonceResponseBody::new(&state.backup_id, &nonce, tries))
            .map_err(|e| TransportError::Connection(e.to_string()))
    }
}
