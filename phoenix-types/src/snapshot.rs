//! Full-dataset snapshot wire format and the local integrity checkpoint.
//!
//! The chunked `meta` + `chunks/{index}` layout is a compatibility
//! contract shared by every sync path that moves the whole dataset; field
//! names are fixed (camelCase) and must not change.

use crate::ids::LayerKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Snapshot wire schema version.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 2;

/// A full point-in-time copy of the dataset: the large student collection
/// plus the small settings/category collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSnapshot {
    pub students: Vec<Value>,
    pub settings: Value,
    pub categories: Vec<Value>,
    pub synced_at: DateTime<Utc>,
    pub schema_version: u32,
}

impl DatasetSnapshot {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            students: Vec::new(),
            settings: Value::Null,
            categories: Vec::new(),
            synced_at: now,
            schema_version: SNAPSHOT_SCHEMA_VERSION,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty() && self.settings.is_null() && self.categories.is_empty()
    }
}

/// The single `meta` document: small collections plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    pub settings: Value,
    pub categories: Vec<Value>,
    pub total_students: u64,
    pub total_chunks: u32,
    pub synced_at: DateTime<Utc>,
    pub schema_version: u32,
}

/// One `chunks/{index}` document. `chunk_index` is embedded because
/// backend listing order is unordered; restore sorts on this field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotChunk {
    pub chunk_index: u32,
    pub students: Vec<Value>,
}

/// The Ash Seed: a small unencrypted checkpoint persisted in the most
/// durable local store. It is not a backup — it records that data should
/// exist and roughly how much, even when every replicated layer is
/// unreachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AshSeed {
    /// Record counts per logical type.
    pub record_counts: BTreeMap<String, u64>,
    /// Checksum over record ids and modified stamps.
    pub checksum: String,
    /// Which layers were reachable when the seed was generated.
    pub layer_availability: BTreeMap<LayerKind, bool>,
    pub generated_at: DateTime<Utc>,
}

impl AshSeed {
    pub fn total_records(&self) -> u64 {
        self.record_counts.values().sum()
    }
}
