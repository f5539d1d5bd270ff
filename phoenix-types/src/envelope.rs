//! The replication envelope — one encrypted record, addressed by blind index.

use crate::ids::SecureId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope schema version written into every header.
pub const ENVELOPE_SCHEMA_VERSION: &str = "3";

/// Envelope metadata. Everything identifying is hashed or encrypted;
/// the header is safe to store verbatim in any backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Blind-index storage key.
    pub sid: SecureId,
    /// Schema version.
    pub v: String,
    /// The record's logical type, encrypted (base64 ciphertext).
    #[serde(rename = "type")]
    pub record_type_ct: String,
    /// Creation timestamp. Informative only, not a logical clock.
    pub ts: DateTime<Utc>,
    /// Weak corruption-detection tag over `sid` and a size fingerprint of
    /// the body. Not cryptographically binding.
    pub integrity: String,
}

/// The unit of replication: header plus one opaque encrypted blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: EnvelopeHeader,
    /// The record, serialized and encrypted as a single base64 blob.
    pub body: String,
}

impl Envelope {
    /// Serialized form used for storage and for byte-for-byte comparison
    /// during reconciliation.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
