//! AES-256-GCM sealing with detached tags.
//!
//! The enclave protocol transmits IV, ciphertext and tag as separate fields,
//! so this module never appends the tag to the ciphertext.

use aes_gcm::{
    Aes256Gcm, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use zeroize::Zeroizing;

use crate::{CryptoError, KEY_SIZE};

/// Size of the AES-GCM IV in bytes (96 bits).
pub const IV_SIZE: usize = 12;

/// Size of the AES-GCM tag in bytes (128 bits).
pub const TAG_SIZE: usize = 16;

/// Output of [`seal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Ciphertext, same length as the plaintext.
    pub ciphertext: Vec<u8>,
    /// IV used for this message.
    pub iv: [u8; IV_SIZE],
    /// Detached authentication tag.
    pub tag: [u8; TAG_SIZE],
}

fn cipher(key: &[u8; KEY_SIZE]) -> Result<Aes256Gcm, CryptoError> {
    Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength)
}

/// Encrypt `plaintext` under `key`, authenticating `aad`.
///
/// `iv` must be fresh per key. Callers draw it from their CSPRNG.
pub fn seal(
    key: &[u8; KEY_SIZE],
    iv: [u8; IV_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Sealed, CryptoError> {
    let mut buffer = plaintext.to_vec();
    let tag = cipher(key)?
        .encrypt_in_place_detached(Nonce::from_slice(&iv), aad, &mut buffer)
        .map_err(|_| CryptoError::Seal)?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(Sealed { ciphertext: buffer, iv, tag: tag_bytes })
}

/// Decrypt and authenticate a sealed payload.
///
/// IV and tag arrive from the network, so their sizes are checked here and
/// reported as [`CryptoError::InvalidLength`].
pub fn open(
    key: &[u8; KEY_SIZE],
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if iv.len() != IV_SIZE {
        return Err(CryptoError::InvalidLength { what: "iv", expected: IV_SIZE, actual: iv.len() });
    }
    if tag.len() != TAG_SIZE {
        return Err(CryptoError::InvalidLength {
            what: "tag",
            expected: TAG_SIZE,
            actual: tag.len(),
        });
    }

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher(key)?
        .decrypt_in_place_detached(Nonce::from_slice(iv), aad, &mut *buffer, Tag::from_slice(tag))
        .map_err(|_| CryptoError::Open)?;

    Ok(buffer)
}
