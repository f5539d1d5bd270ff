use phoenix_crypto::{
    blind_index, decrypt, derive_key, encrypt, generate_random_key, CryptoError, CryptoProvider,
    LockedCrypto, PassthroughCrypto, Salt, VaultCrypto,
};
use proptest::prelude::*;

// ── Cipher ──────────────────────────────────────────────────────

#[test]
fn encrypt_decrypt_round_trip() {
    let key = generate_random_key();
    let plaintext = b"student record payload";

    let enc = encrypt(&key, plaintext).unwrap();
    let dec = decrypt(&key, &enc).unwrap();
    assert_eq!(dec, plaintext);
}

#[test]
fn decrypt_with_wrong_key_fails() {
    let key = generate_random_key();
    let other = generate_random_key();

    let enc = encrypt(&key, b"payload").unwrap();
    let err = decrypt(&other, &enc).unwrap_err();
    assert!(matches!(err, CryptoError::Decryption));
}

#[test]
fn tampered_ciphertext_fails_authentication() {
    let key = generate_random_key();
    let mut enc = encrypt(&key, b"payload").unwrap();

    // Flip a character in the base64 ciphertext
    let mut chars: Vec<char> = enc.ciphertext.chars().collect();
    chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
    enc.ciphertext = chars.into_iter().collect();

    assert!(decrypt(&key, &enc).is_err());
}

#[test]
fn same_plaintext_different_nonce() {
    let key = generate_random_key();
    let a = encrypt(&key, b"payload").unwrap();
    let b = encrypt(&key, b"payload").unwrap();
    assert_ne!(a.nonce, b.nonce);
    assert_ne!(a.ciphertext, b.ciphertext);
}

// ── Key derivation ──────────────────────────────────────────────

#[test]
fn derive_key_is_deterministic() {
    let salt = Salt::generate();
    let a = derive_key("school-admin-passphrase", &salt).unwrap();
    let b = derive_key("school-admin-passphrase", &salt).unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());
}

#[test]
fn derive_key_differs_per_salt() {
    let a = derive_key("passphrase", &Salt::generate()).unwrap();
    let b = derive_key("passphrase", &Salt::generate()).unwrap();
    assert_ne!(a.as_bytes(), b.as_bytes());
}

// ── Blind index ─────────────────────────────────────────────────

#[test]
fn blind_index_deterministic() {
    assert_eq!(
        blind_index("salt", "alice@school.test"),
        blind_index("salt", "alice@school.test"),
    );
}

#[test]
fn blind_index_hides_identifier() {
    let digest = blind_index("salt", "alice@school.test");
    assert!(!digest.contains("alice"));
    assert_eq!(digest.len(), 64); // hex sha256
}

#[test]
fn blind_index_differs_per_salt() {
    assert_ne!(
        blind_index("salt-a", "alice@school.test"),
        blind_index("salt-b", "alice@school.test"),
    );
}

// ── Providers ───────────────────────────────────────────────────

#[test]
fn vault_provider_round_trip() {
    let provider = VaultCrypto::new(generate_random_key(), "install-salt");
    let ct = provider.encrypt_bytes(b"payload").unwrap();
    assert_ne!(ct, b"payload");
    assert_eq!(provider.decrypt_bytes(&ct).unwrap(), b"payload");
}

#[test]
fn passthrough_provider_is_identity() {
    let provider = PassthroughCrypto;
    let ct = provider.encrypt_bytes(b"payload").unwrap();
    assert_eq!(ct, b"payload");
    assert_eq!(provider.decrypt_bytes(&ct).unwrap(), b"payload");
}

#[test]
fn locked_provider_refuses_payload_ops() {
    let provider = LockedCrypto::new("install-salt");
    assert!(!provider.is_available());
    assert!(matches!(
        provider.encrypt_bytes(b"payload").unwrap_err(),
        CryptoError::KeyUnavailable
    ));
    // Blind indexing still works while locked
    assert_eq!(provider.blind_index("x"), provider.blind_index("x"));
}

proptest! {
    #[test]
    fn cipher_round_trips_arbitrary_payloads(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let key = generate_random_key();
        let enc = encrypt(&key, &payload).unwrap();
        prop_assert_eq!(decrypt(&key, &enc).unwrap(), payload);
    }

    #[test]
    fn blind_index_deterministic_for_any_identifier(id in ".{0,64}") {
        prop_assert_eq!(blind_index("salt", &id), blind_index("salt", &id));
    }
}
