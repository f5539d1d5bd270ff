//! Key material: derivation, generation, zeroization.

use crate::error::{CryptoError, CryptoResult};
use argon2::Argon2;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric key size in bytes (ChaCha20-Poly1305).
pub const KEY_SIZE: usize = 32;
/// Salt size in bytes for key derivation.
pub const SALT_SIZE: usize = 16;

/// A derived or generated symmetric key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.write_str("DerivedKey(..)")
    }
}

/// Random salt for key derivation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Salt(pub [u8; SALT_SIZE]);

impl Salt {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

/// Derives a key from a passphrase using Argon2id with default parameters.
pub fn derive_key(passphrase: &str, salt: &Salt) -> CryptoResult<DerivedKey> {
    let mut out = [0u8; KEY_SIZE];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), &salt.0, &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(DerivedKey(out))
}

/// Generates a random symmetric key.
pub fn generate_random_key() -> DerivedKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut bytes);
    DerivedKey(bytes)
}
