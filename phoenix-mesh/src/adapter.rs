//! The common storage-layer capability interface.

use async_trait::async_trait;
use phoenix_types::{DatasetSnapshot, Envelope, LayerKind, SecureId};

/// One replicated storage backend.
///
/// Adapters are isolation boundaries: no implementation may let an error
/// escape. `push` answers `true` only on confirmed acceptance; `pull`
/// answers `None` for both "missing" and "backend down" — callers treat
/// the two identically and try the next layer.
///
/// Each adapter also owns the translation between the backend's native
/// write shape and the dataset snapshot (chunking where the backend caps
/// document sizes), and classifies its own failures: permanent
/// (revoked/expired credential, permission denied) session-disables the
/// layer via the registry, transient is retried next cycle.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Which layer this adapter backs.
    fn layer(&self) -> LayerKind;

    /// Stores an envelope under its `sid`. Idempotent overwrite.
    async fn push(&self, envelope: &Envelope) -> bool;

    /// Fetches an envelope by `sid`.
    async fn pull(&self, sid: &SecureId) -> Option<Envelope>;

    /// Stores a full dataset snapshot in the backend's native shape.
    async fn push_snapshot(&self, snapshot: &DatasetSnapshot) -> bool;

    /// Fetches the most recent dataset snapshot, if the backend holds one.
    async fn pull_snapshot(&self) -> Option<DatasetSnapshot>;
}
