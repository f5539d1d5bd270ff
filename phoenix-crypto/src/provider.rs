//! Pluggable crypto provider.
//!
//! The replication core only ever talks to this trait. `VaultCrypto` is
//! the production implementation; `PassthroughCrypto` is an identity
//! implementation for tests and for pre-unlock operation.

use crate::blind::blind_index;
use crate::cipher::{decrypt, encrypt, EncryptedData};
use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;

/// Encrypt/decrypt/hash capability consumed by the replication core.
pub trait CryptoProvider: Send + Sync {
    /// True once key material is loaded.
    fn is_available(&self) -> bool;

    /// Encrypts raw bytes, returning serialized ciphertext.
    fn encrypt_bytes(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Decrypts serialized ciphertext produced by `encrypt_bytes`.
    fn decrypt_bytes(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Deterministic one-way hash of a record identifier.
    fn blind_index(&self, identifier: &str) -> String;
}

/// Production provider: ChaCha20-Poly1305 under a vault key, with a
/// per-installation blind-index salt.
pub struct VaultCrypto {
    key: DerivedKey,
    index_salt: String,
}

impl VaultCrypto {
    pub fn new(key: DerivedKey, index_salt: impl Into<String>) -> Self {
        Self {
            key,
            index_salt: index_salt.into(),
        }
    }
}

impl CryptoProvider for VaultCrypto {
    fn is_available(&self) -> bool {
        true
    }

    fn encrypt_bytes(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let enc = encrypt(&self.key, plaintext)?;
        Ok(serde_json::to_vec(&enc)?)
    }

    fn decrypt_bytes(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        let enc: EncryptedData = serde_json::from_slice(ciphertext)?;
        decrypt(&self.key, &enc)
    }

    fn blind_index(&self, identifier: &str) -> String {
        blind_index(&self.index_salt, identifier)
    }
}

/// Identity provider. Blind indexing still hashes (storage keys must be
/// deterministic and non-reversible even without a vault key), but the
/// payload passes through untouched.
pub struct PassthroughCrypto;

impl CryptoProvider for PassthroughCrypto {
    fn is_available(&self) -> bool {
        true
    }

    fn encrypt_bytes(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt_bytes(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }

    fn blind_index(&self, identifier: &str) -> String {
        blind_index("passthrough", identifier)
    }
}

/// Provider with no key loaded. Every payload operation fails with
/// `KeyUnavailable`; blind indexing still works.
pub struct LockedCrypto {
    index_salt: String,
}

impl LockedCrypto {
    pub fn new(index_salt: impl Into<String>) -> Self {
        Self {
            index_salt: index_salt.into(),
        }
    }
}

impl CryptoProvider for LockedCrypto {
    fn is_available(&self) -> bool {
        false
    }

    fn encrypt_bytes(&self, _plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        Err(CryptoError::KeyUnavailable)
    }

    fn decrypt_bytes(&self, _ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        Err(CryptoError::KeyUnavailable)
    }

    fn blind_index(&self, identifier: &str) -> String {
        blind_index(&self.index_salt, identifier)
    }
}
