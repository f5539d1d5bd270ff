//! Replication configuration.

use phoenix_types::LayerKind;
use serde::{Deserialize, Serialize};

/// Configuration for the replication engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Minimum number of adapters that must confirm a write. Clamped at
    /// dispatch time to the number of currently-enabled adapters, so a
    /// degraded deployment can still reach durability.
    pub durability_bar: usize,

    /// Per-call adapter timeout in seconds. A timed-out push counts as a
    /// transient failure for that cycle.
    pub adapter_timeout_secs: u64,

    /// Drive session establishment timeout in seconds.
    pub session_timeout_secs: u64,

    /// Retry-queue drain interval in seconds.
    pub drain_interval_secs: u64,

    /// Auto-backup heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,

    /// Checkpoint debounce window in seconds. Bursts of local edits
    /// coalesce into one Ash Seed write.
    pub checkpoint_debounce_secs: u64,

    /// Students per snapshot chunk. Wire-compatibility constant.
    pub chunk_size: usize,

    /// Generate a Life-Pod every Nth successful save.
    pub lifepod_every: u32,

    /// The layer treated as authoritative by self-heal. Changed only via
    /// the explicit promote-gold command.
    pub gold_layer: LayerKind,

    /// Version string written into envelope headers.
    pub envelope_version: String,

    /// Opaque destination handle forwarded to the offline relay.
    pub relay_destination: Option<String>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            durability_bar: 2,
            adapter_timeout_secs: 15,
            session_timeout_secs: 15,
            drain_interval_secs: 300,
            heartbeat_interval_secs: 1800,
            checkpoint_debounce_secs: 10,
            chunk_size: 200,
            lifepod_every: 10,
            gold_layer: LayerKind::Object,
            envelope_version: phoenix_types::ENVELOPE_SCHEMA_VERSION.to_string(),
            relay_destination: None,
        }
    }
}

impl MeshConfig {
    pub fn adapter_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.adapter_timeout_secs)
    }

    pub fn session_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_timeout_secs)
    }
}
