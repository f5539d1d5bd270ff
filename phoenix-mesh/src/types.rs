//! Shared types for replication operations.

use chrono::{DateTime, Utc};
use phoenix_types::{LayerKind, SecureId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Temporary credentials for the object vault.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ObjectCredentials {
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

/// Cached drive session token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriveSession {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl DriveSession {
    /// Returns true if the session will expire within the given seconds.
    pub fn expires_within_secs(&self, secs: i64) -> bool {
        Utc::now() + chrono::Duration::seconds(secs) >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Sync state machine reported to the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Idle,
    Syncing,
    Success,
    Warning,
    Error,
}

/// Replication status: phase, message, and a coarse 0–100 health score.
/// The UI reads this without ever blocking on a cloud operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub message: String,
    pub health: u8,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub pending_retries: u64,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            message: String::new(),
            health: 100,
            last_sync_at: None,
            pending_retries: 0,
        }
    }
}

/// Shared status cell, cloned between the engine and the handle.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<SyncStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, phase: SyncPhase, message: impl Into<String>) {
        let mut status = self.inner.write().unwrap();
        status.phase = phase;
        status.message = message.into();
        if phase == SyncPhase::Success {
            status.last_sync_at = Some(Utc::now());
        }
    }

    pub fn set_health(&self, health: u8, pending_retries: u64) {
        let mut status = self.inner.write().unwrap();
        status.health = health;
        status.pending_retries = pending_retries;
    }

    pub fn snapshot(&self) -> SyncStatus {
        self.inner.read().unwrap().clone()
    }
}

/// Coarse health score from layer availability and retry-queue depth.
pub fn health_score(enabled_layers: usize, total_layers: usize, pending_retries: u64) -> u8 {
    if total_layers == 0 {
        return 0;
    }
    let layer_part = (enabled_layers * 70 / total_layers) as u8;
    let queue_part: u8 = match pending_retries {
        0 => 30,
        1..=9 => 15,
        _ => 0,
    };
    layer_part + queue_part
}

/// Result of a retry-queue drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub succeeded: u64,
    pub still_failing: u64,
}

/// Result of a self-heal pass for one envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealReport {
    pub healed: bool,
    pub layers_fixed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Where a restore ultimately found data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreSource {
    Drive,
    Document,
    LocalPod,
}

impl fmt::Display for RestoreSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreSource::Drive => write!(f, "drive"),
            RestoreSource::Document => write!(f, "document"),
            RestoreSource::LocalPod => write!(f, "local-pod"),
        }
    }
}

/// Result of a restore attempt. `source: None` with zero records is the
/// normal terminal state for a brand-new installation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub source: Option<RestoreSource>,
    pub record_count: u64,
}

/// Commands sent to the replication engine.
#[derive(Debug)]
pub enum MeshCommand {
    Stop,
    ForceSync,
    DrainNow,
    Heal { sid: SecureId },
    PromoteGold { layer: LayerKind },
    ReEnableLayer { layer: LayerKind },
    NotifyMutation,
}
