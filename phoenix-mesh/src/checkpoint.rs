//! Ash Seed generation and checkpoint debouncing.

use crate::error::MeshResult;
use chrono::Utc;
use phoenix_storage::RecordStore;
use phoenix_types::{AshSeed, LayerKind};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

/// Builds a checkpoint of the current local dataset.
///
/// The checksum covers record ids and modification stamps in stable
/// order — enough to tell "data should exist and roughly this much"
/// even when every replicated layer is unreachable.
pub fn build_ash_seed(
    records: &RecordStore,
    layer_availability: BTreeMap<LayerKind, bool>,
) -> MeshResult<AshSeed> {
    let record_counts = records.count_by_type()?;

    let mut hasher = Sha256::new();
    for (id, modified_at) in records.fingerprint_rows()? {
        hasher.update(id.as_bytes());
        hasher.update(modified_at.to_le_bytes());
    }

    Ok(AshSeed {
        record_counts,
        checksum: hex::encode(hasher.finalize()),
        layer_availability,
        generated_at: Utc::now(),
    })
}

/// Trailing-edge debouncer for checkpoint writes.
///
/// The first mutation in a burst arms a deadline one window away;
/// further mutations inside the window coalesce into that same deadline,
/// so ten rapid edits produce exactly one checkpoint write.
#[derive(Debug)]
pub struct CheckpointDebouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl CheckpointDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Notes a local mutation at `now`.
    pub fn note_mutation(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
    }

    /// True exactly once per armed burst, when the deadline has passed.
    pub fn should_fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}
