//! Chunked snapshot codec.
//!
//! The `meta` + `chunks/{index}` layout is a wire-compatibility contract
//! shared by every path that moves the whole dataset (document vault,
//! drive vault, offline relay). The large student collection is split
//! into fixed-size groups; settings and categories ride in the single
//! `meta` document together with the bookkeeping fields.

use crate::error::MeshResult;
use chrono::Utc;
use phoenix_storage::RecordStore;
use phoenix_types::{
    DatasetSnapshot, Record, SnapshotChunk, SnapshotMeta, SNAPSHOT_SCHEMA_VERSION,
};
use serde_json::Value;

/// Fields dropped by text-only backup paths.
const BINARY_FIELDS: [&str; 3] = ["photo", "photoData", "signatureData"];

/// Splits a snapshot into the meta document and its chunk documents.
pub fn chunk_snapshot(
    snapshot: &DatasetSnapshot,
    chunk_size: usize,
) -> (SnapshotMeta, Vec<SnapshotChunk>) {
    let chunk_size = chunk_size.max(1);

    let chunks: Vec<SnapshotChunk> = snapshot
        .students
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, group)| SnapshotChunk {
            chunk_index: i as u32,
            students: group.to_vec(),
        })
        .collect();

    let meta = SnapshotMeta {
        settings: snapshot.settings.clone(),
        categories: snapshot.categories.clone(),
        total_students: snapshot.students.len() as u64,
        total_chunks: chunks.len() as u32,
        synced_at: snapshot.synced_at,
        schema_version: snapshot.schema_version,
    };

    (meta, chunks)
}

/// Reassembles a snapshot from meta plus chunks in any order.
///
/// Sorts by the embedded `chunkIndex` — backend listing order is
/// unordered and must never be trusted.
pub fn assemble_snapshot(meta: SnapshotMeta, mut chunks: Vec<SnapshotChunk>) -> DatasetSnapshot {
    chunks.sort_by_key(|c| c.chunk_index);

    let mut students = Vec::with_capacity(meta.total_students as usize);
    for chunk in chunks {
        students.extend(chunk.students);
    }

    DatasetSnapshot {
        students,
        settings: meta.settings,
        categories: meta.categories,
        synced_at: meta.synced_at,
        schema_version: meta.schema_version,
    }
}

/// Copy of a snapshot with large binary fields removed from every
/// student. Text-only fallback backends store this by policy.
pub fn strip_binary_fields(snapshot: &DatasetSnapshot) -> DatasetSnapshot {
    let students = snapshot
        .students
        .iter()
        .map(|student| {
            let mut student = student.clone();
            if let Some(obj) = student.as_object_mut() {
                for field in BINARY_FIELDS {
                    obj.remove(field);
                }
            }
            student
        })
        .collect();

    DatasetSnapshot {
        students,
        ..snapshot.clone()
    }
}

/// Builds a snapshot of the current local dataset.
pub fn build_dataset(records: &RecordStore) -> MeshResult<DatasetSnapshot> {
    let mut snapshot = DatasetSnapshot::empty(Utc::now());

    for record in records.list_records("student")? {
        snapshot.students.push(with_embedded_id(record));
    }
    for record in records.list_records("category")? {
        snapshot.categories.push(with_embedded_id(record));
    }
    if let Some(settings) = records.get_record("settings")? {
        snapshot.settings = settings.data;
    }
    snapshot.schema_version = SNAPSHOT_SCHEMA_VERSION;

    Ok(snapshot)
}

/// Embeds the record id in the payload so restore round-trips it.
fn with_embedded_id(record: Record) -> Value {
    let mut data = record.data;
    if let (Some(id), Some(obj)) = (record.id, data.as_object_mut()) {
        obj.entry("id").or_insert(Value::String(id));
    }
    data
}
