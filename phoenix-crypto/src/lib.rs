//! Encryption layer for Phoenix.
//!
//! Provides the crypto the replication core leans on:
//! - Argon2id key derivation from the vault passphrase
//! - ChaCha20-Poly1305 authenticated encryption for envelope bodies
//! - SHA-256 blind indexing so identifiers never reach a backend in clear
//!
//! # Architecture
//!
//! Replication never calls the cipher directly. Everything goes through
//! the [`CryptoProvider`] trait so the sync core can be tested with the
//! identity [`PassthroughCrypto`], decoupling replication correctness
//! from cipher correctness. [`VaultCrypto`] is the production provider.

mod blind;
mod cipher;
mod error;
mod key;
mod provider;

pub use blind::blind_index;
pub use cipher::{decrypt, encrypt, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, generate_random_key, DerivedKey, Salt, KEY_SIZE, SALT_SIZE};
pub use provider::{CryptoProvider, LockedCrypto, PassthroughCrypto, VaultCrypto};
