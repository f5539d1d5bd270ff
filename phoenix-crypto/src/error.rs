//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in crypto operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    Encryption,

    #[error("decryption failed (wrong key or corrupted ciphertext)")]
    Decryption,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("no key material loaded")]
    KeyUnavailable,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
