//! PIN key derivation.
//!
//! Every intermediate value is a fixed 32-byte newtype that zeroizes on drop
//! and never prints its contents.
//!
//! # Invariants
//!
//! - Determinism: identical `(pin, pin_key2)` always yield the same
//!   [`MasterKey`]. Local verification depends on this.
//! - Argument order: `PinKey1` is the HMAC key and `PinKey2` the message. The
//!   enclave side derives with the same order.

use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::CryptoError;

/// Size of every derived key in bytes.
pub const KEY_SIZE: usize = 32;

/// PBKDF2 round count for PIN stretching.
pub const PIN_STRETCH_ITERATIONS: u32 = 20_000;

/// Fixed PBKDF2 salt. The PIN is combined with a random server share later,
/// so a per-user salt adds nothing here.
const PIN_STRETCH_SALT: &[u8] = b"nosalt";

/// HMAC message for `StretchedPin -> PinKey1`.
const PIN_KEY1_LABEL: &[u8] = b"Master Key Encryption";

/// HMAC message for `MasterKey -> registration lock token`.
const REGISTRATION_LOCK_LABEL: &[u8] = b"Registration Lock";

type HmacSha256 = Hmac<Sha256>;

macro_rules! secret_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Zeroize, ZeroizeOnDrop)]
        pub struct $name([u8; KEY_SIZE]);

        impl $name {
            /// Wrap raw key bytes.
            pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
                Self(bytes)
            }

            /// Parse from a slice of exactly [`KEY_SIZE`] bytes.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
                let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
                    CryptoError::InvalidLength {
                        what: stringify!($name),
                        expected: KEY_SIZE,
                        actual: bytes.len(),
                    }
                })?;
                Ok(Self(array))
            }

            /// Raw key bytes.
            pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "(<redacted {} bytes>)"), KEY_SIZE)
            }
        }
    };
}

secret_key!(
    /// PBKDF2 output for a PIN. Sent to the enclave, never stored.
    StretchedPin
);

secret_key!(
    /// HMAC of the stretched PIN. Local only, never stored.
    PinKey1
);

secret_key!(
    /// Server share. Random at backup time, returned by the enclave on
    /// restore. Stored locally next to the master key.
    PinKey2
);

secret_key!(
    /// Master key. Stored locally next to the server share.
    MasterKey
);

impl MasterKey {
    /// Constant-time equality.
    pub fn ct_eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<[u8; KEY_SIZE], CryptoError> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength)?;
    mac.update(message);

    let mut out = [0u8; KEY_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Stretch a PIN with PBKDF2-HMAC-SHA256.
///
/// Deliberately slow. Callers should derive once per operation.
pub fn derive_stretched_pin(pin: &str) -> StretchedPin {
    let mut out = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), PIN_STRETCH_SALT, PIN_STRETCH_ITERATIONS, &mut out);
    StretchedPin(out)
}

/// Derive `PinKey1 = HMAC(stretched_pin, "Master Key Encryption")`.
pub fn derive_pin_key1(stretched_pin: &StretchedPin) -> Result<PinKey1, CryptoError> {
    hmac_sha256(&stretched_pin.0, PIN_KEY1_LABEL).map(PinKey1)
}

/// Build a fresh server share from caller-provided CSPRNG output.
pub fn generate_pin_key2(random_bytes: [u8; KEY_SIZE]) -> PinKey2 {
    PinKey2(random_bytes)
}

/// Derive `MasterKey = HMAC(pin_key1, pin_key2)`.
pub fn derive_master_key(pin_key1: &PinKey1, pin_key2: &PinKey2) -> Result<MasterKey, CryptoError> {
    hmac_sha256(&pin_key1.0, &pin_key2.0).map(MasterKey)
}

/// Derive the hex registration lock token from the master key.
///
/// Always 64 lowercase hex characters.
pub fn derive_registration_lock_token(master_key: &MasterKey) -> Result<String, CryptoError> {
    hmac_sha256(&master_key.0, REGISTRATION_LOCK_LABEL).map(hex::encode)
}
