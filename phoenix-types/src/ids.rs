//! Identifier types: blind-index storage keys and layer tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Blind-index storage key derived from a record's identifier.
///
/// The same cleartext identifier always hashes to the same `SecureId`, so
/// repeated saves of one logical record overwrite the same key in every
/// backend, while the identifier itself never appears in plaintext there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecureId(String);

impl SecureId {
    /// Wraps an already-hashed hex digest.
    pub fn from_digest(digest: String) -> Self {
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The replicated storage layers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// Primary remote document store.
    Document,
    /// Object/blob store.
    Object,
    /// Third-party cloud drive.
    Drive,
}

impl LayerKind {
    /// All layers, in dispatch order.
    pub const ALL: [LayerKind; 3] = [LayerKind::Document, LayerKind::Object, LayerKind::Drive];
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Document => write!(f, "document"),
            LayerKind::Object => write!(f, "object"),
            LayerKind::Drive => write!(f, "drive"),
        }
    }
}
