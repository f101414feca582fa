//! Outer request/response messages.
//!
//! The outer request is a closed union over the three operations. The outer
//! response carries an optional slot per operation; the client extracts the
//! slot matching what it asked for and treats an empty slot as a protocol
//! violation.

use serde::{Deserialize, Serialize};

use crate::{
    BackupRequest, BackupResponse, DeleteRequest, DeleteResponse, ProtoError, RestoreRequest,
    RestoreResponse, codec,
};

/// Operation carried by an envelope. Also the `type` field of the JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Store the server share.
    Backup,
    /// Retrieve the server share.
    Restore,
    /// Remove the server share.
    Delete,
}

impl RequestKind {
    /// Wire name of the operation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Restore => "restore",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outer request message, encrypted as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyBackupRequest {
    /// Backup variant.
    Backup(BackupRequest),
    /// Restore variant.
    Restore(RestoreRequest),
    /// Delete variant.
    Delete(DeleteRequest),
}

impl KeyBackupRequest {
    /// Operation this request performs.
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Backup(_) => RequestKind::Backup,
            Self::Restore(_) => RequestKind::Restore,
            Self::Delete(_) => RequestKind::Delete,
        }
    }

    /// Encode to CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>, ProtoError> {
        codec::encode(self)
    }

    /// Decode from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, ProtoError> {
        codec::decode(bytes)
    }
}

/// Outer response message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBackupResponse {
    /// Set when answering a backup.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub backup: Option<BackupResponse>,
    /// Set when answering a restore.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub restore: Option<RestoreResponse>,
    /// Set when answering a delete.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub delete: Option<DeleteResponse>,
}

impl KeyBackupResponse {
    /// Encode to CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>, ProtoError> {
        codec::encode(self)
    }

    /// Decode from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, ProtoError> {
        codec::decode(bytes)
    }
}
