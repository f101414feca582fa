//! JSON bodies exchanged with the enclave frontend.
//!
//! Binary fields are standard base64. The encrypted bodies carry the AES-GCM
//! IV, ciphertext and detached tag as separate fields.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::{ProtoError, RequestKind};

fn decode_field(value: &str, field: &'static str) -> Result<Vec<u8>, ProtoError> {
    BASE64.decode(value).map_err(|_| ProtoError::Base64 { field })
}

/// Raw parts of an AES-GCM sealed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedParts {
    /// Initialization vector.
    pub iv: Vec<u8>,
    /// Ciphertext without the tag.
    pub ciphertext: Vec<u8>,
    /// Detached authentication tag.
    pub mac: Vec<u8>,
}

/// Body of an encrypted enclave request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedRequestBody {
    /// Attestation request id, also the AEAD associated data.
    pub request_id: String,
    /// AES-GCM IV.
    pub iv: String,
    /// AES-GCM ciphertext.
    pub data: String,
    /// AES-GCM tag.
    pub mac: String,
    /// Operation carried inside the ciphertext.
    #[serde(rename = "type")]
    pub kind: RequestKind,
}

impl EncryptedRequestBody {
    /// Build a body from raw bytes.
    pub fn new(kind: RequestKind, request_id: &[u8], sealed: &SealedParts) -> Self {
        Self {
            request_id: BASE64.encode(request_id),
            iv: BASE64.encode(&sealed.iv),
            data: BASE64.encode(&sealed.ciphertext),
            mac: BASE64.encode(&sealed.mac),
            kind,
        }
    }

    /// Decoded request id.
    pub fn request_id(&self) -> Result<Vec<u8>, ProtoError> {
        decode_field(&self.request_id, "requestId")
    }

    /// Decoded sealed payload.
    pub fn sealed(&self) -> Result<SealedParts, ProtoError> {
        Ok(SealedParts {
            iv: decode_field(&self.iv, "iv")?,
            ciphertext: decode_field(&self.data, "data")?,
            mac: decode_field(&self.mac, "mac")?,
        })
    }
}

/// Body of an encrypted enclave response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedResponseBody {
    /// AES-GCM IV.
    pub iv: String,
    /// AES-GCM ciphertext.
    pub data: String,
    /// AES-GCM tag.
    pub mac: String,
}

impl EncryptedResponseBody {
    /// Build a body from raw bytes.
    pub fn new(sealed: &SealedParts) -> Self {
        Self {
            iv: BASE64.encode(&sealed.iv),
            data: BASE64.encode(&sealed.ciphertext),
            mac: BASE64.encode(&sealed.mac),
        }
    }

    /// Decoded sealed payload.
    pub fn sealed(&self) -> Result<SealedParts, ProtoError> {
        Ok(SealedParts {
            iv: decode_field(&self.iv, "iv")?,
            ciphertext: decode_field(&self.data, "data")?,
            mac: decode_field(&self.mac, "mac")?,
        })
    }
}

/// Nonce fetch response.
///
/// Older frontends name the nonce `token`; both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponseBody {
    /// Base64 backup id.
    pub backup_id: String,
    /// Base64 single-use nonce.
    #[serde(alias = "token")]
    pub nonce: String,
    /// PIN attempts remaining for this backup id.
    pub tries: u32,
}

impl NonceResponseBody {
    /// Build a body from raw bytes.
    pub fn new(backup_id: &[u8], nonce: &[u8], tries: u32) -> Self {
        Self { backup_id: BASE64.encode(backup_id), nonce: BASE64.encode(nonce), tries }
    }

    /// Decoded backup id.
    pub fn backup_id(&self) -> Result<Vec<u8>, ProtoError> {
        decode_field(&self.backup_id, "backupId")
    }

    /// Decoded nonce.
    pub fn nonce(&self) -> Result<Vec<u8>, ProtoError> {
        decode_field(&self.nonce, "nonce")
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn request_body_uses_camel_case_and_type_tag() {
        let sealed = SealedParts { iv: vec![1; 12], ciphertext: vec![2; 5], mac: vec![3; 16] };
        let body = EncryptedRequestBody::new(RequestKind::Backup, b"req", &sealed);

        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["requestId"], "cmVx");
        assert_eq!(json["type"], "backup");
        assert_eq!(body.sealed().expect("decode"), sealed);
    }

    #[test]
    fn response_body_rejects_bad_base64() {
        let body = EncryptedResponseBody {
            iv: "AAAAAAAAAAAAAAAA".to_string(),
            data: "not base64!".to_string(),
            mac: String::new(),
        };

        assert_eq!(body.sealed(), Err(ProtoError::Base64 { field: "data" }));
    }

    #[test]
    fn nonce_body_accepts_token_alias() {
        let json = r#"{"backupId":"3q2+7w==","token":"AQID","tries":7}"#;
        let body: NonceResponseBody = serde_json::from_str(json).expect("parse");

        assert_eq!(body.backup_id().expect("decode"), hex!("deadbeef"));
        assert_eq!(body.nonce().expect("decode"), vec![1, 2, 3]);
        assert_eq!(body.tries, 7);
    }

    #[test]
    fn nonce_body_rejects_non_integer_tries() {
        let json = r#"{"backupId":"AA==","nonce":"AA==","tries":"many"}"#;
        assert!(serde_json::from_str::<NonceResponseBody>(json).is_err());
    }

    #[test]
    fn nonce_body_rejects_missing_field() {
        let json = r#"{"backupId":"AA==","tries":3}"#;
        assert!(serde_json::from_str::<NonceResponseBody>(json).is_err());
    }
}
