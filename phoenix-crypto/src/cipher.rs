//! ChaCha20-Poly1305 authenticated encryption.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Nonce size in bytes.
pub const NONCE_SIZE: usize = 12;
/// Poly1305 tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Ciphertext plus nonce, serializable for storage in any backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    /// Base64 nonce.
    pub nonce: String,
    /// Base64 ciphertext (includes the auth tag).
    pub ciphertext: String,
}

/// Encrypts a plaintext with a fresh random nonce.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    Ok(EncryptedData {
        nonce: B64.encode(nonce_bytes),
        ciphertext: B64.encode(ciphertext),
    })
}

/// Decrypts and authenticates. Fails on any tampering or a wrong key.
pub fn decrypt(key: &DerivedKey, data: &EncryptedData) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let nonce_bytes = B64
        .decode(&data.nonce)
        .map_err(|e| CryptoError::Encoding(format!("nonce: {e}")))?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(CryptoError::Encoding(format!(
            "nonce length {} != {NONCE_SIZE}",
            nonce_bytes.len()
        )));
    }

    let ciphertext = B64
        .decode(&data.ciphertext)
        .map_err(|e| CryptoError::Encoding(format!("ciphertext: {e}")))?;

    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| CryptoError::Decryption)
}
