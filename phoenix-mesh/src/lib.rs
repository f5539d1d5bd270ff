//! Resilient replication core for Phoenix.
//!
//! Replicates the local dataset across independent storage layers with:
//! - Blind-index-addressed encrypted envelopes (idempotent overwrites)
//! - Concurrent fan-out with an explicit durability bar
//! - A durable retry queue for sub-quorum saves
//! - Sticky session-disable for revoked backends, per-cycle retry for blips
//! - Gold-source self-heal and priority-chain restore
//!
//! Follows the same engine/handle architecture as the rest of the suite:
//! `create_mesh_engine` returns a `MeshHandle` for commands and a
//! `MeshEngine` whose `run()` owns every background timer.

pub mod adapter;
pub mod adapters;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod heal;
pub mod mapper;
pub mod orchestrator;
pub mod registry;
pub mod relay;
pub mod restore;
pub mod snapshot;
pub mod types;

pub use adapter::StorageAdapter;
pub use config::MeshConfig;
pub use error::{MeshError, MeshResult};
pub use heal::Reconciler;
pub use mapper::EnvelopeMapper;
pub use orchestrator::{create_mesh_engine, MeshEngine, MeshHandle, ReplicationOrchestrator};
pub use registry::{LayerHealth, LayerRegistry};
pub use relay::{ChannelRelay, RelayJob, SnapshotRelay};
pub use restore::RestoreCoordinator;
pub use types::*;
