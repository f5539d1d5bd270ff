//! Replication error types.

use phoenix_types::LayerKind;
use thiserror::Error;

/// Result type for replication operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Errors that can occur in the replication core.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("envelope mapping failed: {0}")]
    Map(String),

    #[error("{layer} layer operation failed: {message}")]
    Adapter { layer: LayerKind, message: String },

    #[error("credentials expired or revoked")]
    CredentialExpired,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("gold layer unavailable")]
    GoldUnavailable,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("engine not running")]
    ChannelClosed,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] phoenix_storage::StorageError),

    #[error("crypto error: {0}")]
    Crypto(#[from] phoenix_crypto::CryptoError),
}

impl MeshError {
    /// Permanent failures session-disable a layer; everything else is
    /// retried next cycle.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            MeshError::CredentialExpired | MeshError::PermissionDenied(_)
        )
    }
}

/// Classifies an HTTP status: auth/permission responses are permanent,
/// everything else transient.
pub fn permanent_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
}
