//! Core types shared across the Phoenix workspace.
//!
//! Phoenix replicates application records across several independent
//! storage layers. This crate holds the vocabulary every other crate
//! speaks:
//! - `Record` — an application-level entity (student, settings bundle)
//! - `Envelope` — the encrypted, blind-index-addressed unit of replication
//! - `DatasetSnapshot` — the chunked full-dataset wire format
//! - `AshSeed` — the local integrity checkpoint

mod envelope;
mod ids;
mod record;
mod snapshot;

pub use envelope::{Envelope, EnvelopeHeader, ENVELOPE_SCHEMA_VERSION};
pub use ids::{LayerKind, SecureId};
pub use record::Record;
pub use snapshot::{
    AshSeed, DatasetSnapshot, SnapshotChunk, SnapshotMeta, SNAPSHOT_SCHEMA_VERSION,
};
