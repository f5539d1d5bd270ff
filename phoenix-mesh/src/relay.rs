//! Offline relay — the hand-off to the installable background worker.
//!
//! The worker is an external collaborator: it persists its own queue and
//! wakes on connectivity-restore signals. Phoenix only needs to offer it
//! jobs in the shared snapshot contract and fall back to a direct push
//! when it is absent or declines.

use async_trait::async_trait;
use phoenix_types::DatasetSnapshot;
use tokio::sync::mpsc;

/// One snapshot hand-off to the background worker.
#[derive(Debug, Clone)]
pub struct RelayJob {
    /// Opaque destination credentials/handle, forwarded untouched.
    pub destination: Option<String>,
    pub snapshot: DatasetSnapshot,
}

/// Queue-consumer interface of the background worker.
#[async_trait]
pub trait SnapshotRelay: Send + Sync {
    /// Offers a job. `true` means the worker accepted and now owns
    /// delivery; `false` means the caller must push directly.
    async fn enqueue(&self, job: RelayJob) -> bool;
}

/// Relay backed by an in-process channel to the worker bridge.
pub struct ChannelRelay {
    tx: mpsc::Sender<RelayJob>,
}

impl ChannelRelay {
    pub fn new(tx: mpsc::Sender<RelayJob>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl SnapshotRelay for ChannelRelay {
    async fn enqueue(&self, job: RelayJob) -> bool {
        self.tx.send(job).await.is_ok()
    }
}
