//! Blind-index hashing.

use sha2::{Digest, Sha256};

/// One-way hash of an identifier under an installation salt.
///
/// Deterministic: the same salt + identifier always produce the same
/// digest, which is what makes envelope overwrites idempotent across
/// every backend.
pub fn blind_index(salt: &str, identifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(identifier.as_bytes());
    hex::encode(hasher.finalize())
}
