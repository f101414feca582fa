//! CBOR codec for protocol messages.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtoError;

/// Serialize a message to CBOR bytes.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtoError> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| ProtoError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a message from CBOR bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtoError> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtoError::Decode(e.to_string()))
}
