//! Envelope mapping — record in, encrypted envelope out.
//!
//! The single most important invariant in this subsystem lives here:
//! no application record is ever discarded on a mapping failure. When
//! serialization or crypto throws, the record is preserved in cleartext
//! in the local dead-letter store and the caller gets `None`, never an
//! exception.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use chrono::Utc;
use phoenix_crypto::CryptoProvider;
use phoenix_storage::QueueStore;
use phoenix_types::{Envelope, EnvelopeHeader, Record, SecureId};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, warn};

/// Fields removed before encryption. The body is encrypted anyway;
/// stripping is defense in depth.
const SENSITIVE_FIELDS: [&str; 3] = ["password", "token", "secret"];

/// Maps application records into replication envelopes.
pub struct EnvelopeMapper {
    crypto: Arc<dyn CryptoProvider>,
    queue: QueueStore,
}

impl EnvelopeMapper {
    pub fn new(crypto: Arc<dyn CryptoProvider>, queue: QueueStore) -> Self {
        Self { crypto, queue }
    }

    /// Assigns a surrogate id when the record has none. A missing
    /// identifier is a deliberate fallback, not an error — the only
    /// observable side effect is a warning.
    pub fn ensure_identity(record: &mut Record) {
        if record.id.as_deref().is_some_and(|id| !id.is_empty()) {
            return;
        }
        let surrogate = format!(
            "auto_{}_{}",
            Utc::now().timestamp_millis(),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        warn!(
            "{} record missing identifier, assigned surrogate {surrogate}",
            record.record_type
        );
        record.id = Some(surrogate);
    }

    /// Converts a record into its envelope. Returns `None` on failure —
    /// the record is already preserved in the dead-letter store by then.
    pub fn map_to_envelope(&self, record: &Record, origin_version: &str) -> Option<Envelope> {
        match self.try_map(record, origin_version) {
            Ok(envelope) => Some(envelope),
            Err(reason) => {
                warn!(
                    "mapping failed for {} record, preserving to dead letter: {reason}",
                    record.record_type
                );
                if let Err(e) =
                    self.queue
                        .dead_letter_put(&record.record_type, &record.data, &reason)
                {
                    // Worst case: the record stays visible in the local
                    // store only.
                    error!("dead-letter write also failed: {e}");
                }
                None
            }
        }
    }

    /// Blind index for a record, derived from the best available key.
    pub fn sid_for(&self, record: &Record) -> SecureId {
        SecureId::from_digest(self.crypto.blind_index(&identifier_for(record)))
    }

    fn try_map(&self, record: &Record, origin_version: &str) -> Result<Envelope, String> {
        let sid = self.sid_for(record);

        let mut data = record.data.clone();
        if let Some(obj) = data.as_object_mut() {
            for field in SENSITIVE_FIELDS {
                obj.remove(field);
            }
        }

        let plaintext =
            serde_json::to_vec(&data).map_err(|e| format!("serialization: {e}"))?;
        let body_ct = self
            .crypto
            .encrypt_bytes(&plaintext)
            .map_err(|e| format!("body encryption: {e}"))?;
        let type_ct = self
            .crypto
            .encrypt_bytes(record.record_type.as_bytes())
            .map_err(|e| format!("type encryption: {e}"))?;

        let body = B64.encode(body_ct);
        let integrity = integrity_tag(&sid, body.len());

        Ok(Envelope {
            header: EnvelopeHeader {
                sid,
                v: origin_version.to_string(),
                record_type_ct: B64.encode(type_ct),
                ts: Utc::now(),
                integrity,
            },
            body,
        })
    }

    /// Decrypts an envelope body back into record data.
    pub fn open_envelope(&self, envelope: &Envelope) -> Result<serde_json::Value, String> {
        let ciphertext = B64
            .decode(&envelope.body)
            .map_err(|e| format!("body decode: {e}"))?;
        let plaintext = self
            .crypto
            .decrypt_bytes(&ciphertext)
            .map_err(|e| format!("body decryption: {e}"))?;
        serde_json::from_slice(&plaintext).map_err(|e| format!("body parse: {e}"))
    }
}

/// Best-identifier-wins key selection: a stable human-meaningful key
/// beats a surrogate one so re-imports of the same logical entity
/// converge on the same `sid`.
fn identifier_for(record: &Record) -> String {
    if let Some(email) = record.email() {
        return email.to_string();
    }
    if let Some(number) = record.admission_no() {
        return number;
    }
    if let Some(id) = record.id.as_deref().filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    format!("fallback_{}", Utc::now().timestamp_millis())
}

/// Weak corruption-detection tag: `sid` plus a size fingerprint of the
/// body. Detects gross corruption only.
pub fn integrity_tag(sid: &SecureId, body_len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sid.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(body_len.to_le_bytes());
    hex::encode(&hasher.finalize()[..8])
}

/// Verifies an envelope's integrity tag against its body.
pub fn verify_integrity(envelope: &Envelope) -> bool {
    integrity_tag(&envelope.header.sid, envelope.body.len()) == envelope.header.integrity
}
