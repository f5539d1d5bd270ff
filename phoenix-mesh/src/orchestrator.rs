//! Replication orchestrator and the background engine loop.
//!
//! `save` fans a mapped envelope out to every enabled adapter
//! concurrently, waits for all of them to settle (never fail-fast),
//! counts confirmed acceptances against the durability bar, and queues a
//! retry when the bar is missed. The engine loop owns every background
//! timer: retry drain, auto-backup heartbeat, and the debounced
//! checkpoint writer. One tick failing never kills future ticks.

use crate::adapter::StorageAdapter;
use crate::checkpoint::{self, CheckpointDebouncer};
use crate::config::MeshConfig;
use crate::error::{MeshError, MeshResult};
use crate::heal::Reconciler;
use crate::mapper::EnvelopeMapper;
use crate::registry::LayerRegistry;
use crate::relay::{RelayJob, SnapshotRelay};
use crate::snapshot;
use crate::types::*;
use futures::future::join_all;
use phoenix_storage::{MetaStore, QueueStore, RecordStore};
use phoenix_types::{Envelope, LayerKind, Record, SecureId};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Coordinates mapping, fan-out, and retry queueing.
pub struct ReplicationOrchestrator {
    mapper: EnvelopeMapper,
    adapters: Vec<Arc<dyn StorageAdapter>>,
    registry: Arc<LayerRegistry>,
    records: RecordStore,
    queue: QueueStore,
    meta: MetaStore,
    config: MeshConfig,
    status: StatusBoard,
    relay: Option<Arc<dyn SnapshotRelay>>,
    save_count: AtomicU32,
}

impl ReplicationOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mapper: EnvelopeMapper,
        adapters: Vec<Arc<dyn StorageAdapter>>,
        registry: Arc<LayerRegistry>,
        records: RecordStore,
        queue: QueueStore,
        meta: MetaStore,
        config: MeshConfig,
        status: StatusBoard,
        relay: Option<Arc<dyn SnapshotRelay>>,
    ) -> Self {
        Self {
            mapper,
            adapters,
            registry,
            records,
            queue,
            meta,
            config,
            status,
            relay,
            save_count: AtomicU32::new(0),
        }
    }

    pub fn registry(&self) -> Arc<LayerRegistry> {
        self.registry.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.status.snapshot()
    }

    /// Saves a record locally and replicates it.
    ///
    /// The local write always completes first — the UI sees it
    /// immediately; cloud state is reported asynchronously through the
    /// status board. Returns `true` only when the durability bar was met
    /// this cycle; `false` means "saved locally, replication pending".
    pub async fn save(&self, record: Record) -> bool {
        let mut record = record;
        EnvelopeMapper::ensure_identity(&mut record);

        if let Err(e) = self.records.save_record(&record) {
            error!("local save failed for {} record: {e}", record.record_type);
            self.status.set(SyncPhase::Error, "local save failed");
            return false;
        }

        let Some(envelope) = self
            .mapper
            .map_to_envelope(&record, &self.config.envelope_version)
        else {
            // Dead-letter already holds the record
            self.status.set(
                SyncPhase::Warning,
                "record kept locally; could not be prepared for sync",
            );
            return false;
        };

        self.status.set(SyncPhase::Syncing, "replicating");
        let (successes, enabled) = self.replicate(&envelope).await;

        let met = bar_met(successes, enabled, self.config.durability_bar);
        if met {
            let count = self.save_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % self.config.lifepod_every.max(1) == 0 {
                // Best-effort side artifact; never affects the save
                self.generate_life_pod();
            }
            self.status.set(
                SyncPhase::Success,
                format!("replicated to {successes} of {enabled} layers"),
            );
        } else {
            if let Err(e) = self.queue.enqueue(&envelope) {
                error!("retry enqueue failed for {}: {e}", envelope.header.sid);
            }
            self.status
                .set(SyncPhase::Warning, "saved locally, cloud sync pending");
        }

        self.refresh_health().await;
        met
    }

    /// Concurrent push to every enabled adapter. Returns confirmed
    /// successes and how many adapters were in the dispatch.
    async fn replicate(&self, envelope: &Envelope) -> (usize, usize) {
        let mut enabled = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            if self.registry.is_enabled(adapter.layer()).await {
                enabled.push(adapter.clone());
            }
        }
        let enabled_count = enabled.len();
        if enabled_count == 0 {
            warn!("no enabled layers; envelope goes straight to the retry queue");
            return (0, 0);
        }

        let timeout = self.config.adapter_timeout();
        let pushes = enabled.into_iter().map(|adapter| {
            let registry = self.registry.clone();
            let envelope = envelope.clone();
            async move {
                match tokio::time::timeout(timeout, adapter.push(&envelope)).await {
                    Ok(accepted) => accepted,
                    Err(_) => {
                        registry
                            .mark_transient_failure(adapter.layer(), "push timed out")
                            .await;
                        false
                    }
                }
            }
        });

        // Wait for every push to settle; one rejection never short-circuits
        let results = join_all(pushes).await;
        let successes = results.into_iter().filter(|ok| *ok).count();
        debug!(
            "fan-out for {}: {successes}/{enabled_count} layers accepted",
            envelope.header.sid
        );
        (successes, enabled_count)
    }

    /// Re-attempts every queued envelope through the same fan-out logic
    /// as `save`. Shared by the drain timer and the manual command.
    pub async fn drain(&self) -> DrainReport {
        let entries = match self.queue.load_all() {
            Ok(entries) => entries,
            Err(e) => {
                error!("retry queue unreadable: {e}");
                return DrainReport::default();
            }
        };
        if entries.is_empty() {
            return DrainReport::default();
        }

        info!("draining {} queued envelopes", entries.len());
        let mut report = DrainReport::default();

        for entry in entries {
            // Replication, not re-mapping: the queued envelope is reused
            // verbatim
            let (successes, enabled) = self.replicate(&entry.envelope).await;
            if bar_met(successes, enabled, self.config.durability_bar) {
                if let Err(e) = self.queue.remove(&entry.sid) {
                    warn!("drained envelope could not be dequeued: {e}");
                }
                report.succeeded += 1;
            } else {
                if let Err(e) = self.queue.bump_attempts(&entry.sid) {
                    warn!("attempt counter update failed: {e}");
                }
                report.still_failing += 1;
            }
        }

        if report.still_failing == 0 {
            self.status.set(SyncPhase::Success, "retry queue drained");
        }
        self.refresh_health().await;
        report
    }

    /// Full-dataset backup: offer the snapshot to the offline worker,
    /// fall back to a direct push of the same chunked contract.
    pub async fn force_sync(&self) -> bool {
        self.status.set(SyncPhase::Syncing, "backing up dataset");

        let dataset = match snapshot::build_dataset(&self.records) {
            Ok(dataset) => dataset,
            Err(e) => {
                error!("snapshot build failed: {e}");
                self.status.set(SyncPhase::Error, "backup failed to start");
                return false;
            }
        };

        if let Some(relay) = &self.relay {
            let job = RelayJob {
                destination: self.config.relay_destination.clone(),
                snapshot: dataset.clone(),
            };
            if relay.enqueue(job).await {
                info!("snapshot handed to the background worker");
                self.status
                    .set(SyncPhase::Success, "backup queued with background worker");
                return true;
            }
            debug!("background worker unavailable, pushing directly");
        }

        let mut enabled = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            if self.registry.is_enabled(adapter.layer()).await {
                enabled.push(adapter.clone());
            }
        }
        let enabled_count = enabled.len();

        let timeout = self.config.adapter_timeout();
        let pushes = enabled.into_iter().map(|adapter| {
            let registry = self.registry.clone();
            let dataset = dataset.clone();
            async move {
                match tokio::time::timeout(timeout, adapter.push_snapshot(&dataset)).await {
                    Ok(accepted) => accepted,
                    Err(_) => {
                        registry
                            .mark_transient_failure(adapter.layer(), "snapshot push timed out")
                            .await;
                        false
                    }
                }
            }
        });
        let successes = join_all(pushes).await.into_iter().filter(|ok| *ok).count();

        let met = bar_met(successes, enabled_count, self.config.durability_bar);
        if met {
            if let Err(e) = self.regenerate_ash_seed().await {
                warn!("checkpoint write after backup failed: {e}");
            }
            self.status.set(SyncPhase::Success, "backup complete");
        } else {
            self.status.set(
                SyncPhase::Warning,
                "backup incomplete, retrying on next heartbeat",
            );
        }
        self.refresh_health().await;
        met
    }

    /// Rebuilds and persists the Ash Seed. Idempotent; safe under
    /// overlapping heartbeat and debounce invocations.
    pub async fn regenerate_ash_seed(&self) -> MeshResult<()> {
        let availability = self.registry.availability().await;
        let seed = checkpoint::build_ash_seed(&self.records, availability)?;
        self.meta.save_ash_seed(&seed)?;
        debug!("ash seed regenerated ({} records)", seed.total_records());
        Ok(())
    }

    /// Best-effort Life-Pod: a text-only local snapshot artifact.
    fn generate_life_pod(&self) {
        match snapshot::build_dataset(&self.records) {
            Ok(dataset) => {
                let pod = snapshot::strip_binary_fields(&dataset);
                match self.meta.save_life_pod(&pod) {
                    Ok(()) => debug!("life-pod generated ({} students)", pod.students.len()),
                    Err(e) => warn!("life-pod write failed: {e}"),
                }
            }
            Err(e) => warn!("life-pod generation failed: {e}"),
        }
    }

    /// Blows away the local dataset and the checkpoint. The only path
    /// that ever deletes an Ash Seed.
    pub fn factory_reset(&self) -> MeshResult<()> {
        self.records.clear_all()?;
        self.queue.clear_queue()?;
        self.meta.clear_ash_seed()?;
        info!("factory reset complete");
        Ok(())
    }

    async fn refresh_health(&self) {
        let enabled = self.registry.enabled_layers().await.len();
        let pending = self.queue.queue_len().unwrap_or(0);
        self.status
            .set_health(health_score(enabled, self.adapters.len(), pending), pending);
    }
}

/// The durability decision: an explicit integer floor, clamped to the
/// adapters actually in the dispatch so a degraded deployment can still
/// succeed. Zero enabled adapters never meets the bar.
fn bar_met(successes: usize, enabled: usize, bar: usize) -> bool {
    if enabled == 0 {
        return false;
    }
    successes >= bar.clamp(1, enabled)
}

// ── Engine & handle ─────────────────────────────────────────────

/// Handle for sending commands to the running engine.
#[derive(Clone)]
pub struct MeshHandle {
    command_tx: mpsc::Sender<MeshCommand>,
    status: StatusBoard,
}

impl MeshHandle {
    async fn send(&self, cmd: MeshCommand) -> MeshResult<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| MeshError::ChannelClosed)
    }

    /// Stops the engine and clears every background timer.
    pub async fn stop(&self) -> MeshResult<()> {
        self.send(MeshCommand::Stop).await
    }

    pub async fn force_sync(&self) -> MeshResult<()> {
        self.send(MeshCommand::ForceSync).await
    }

    pub async fn drain_now(&self) -> MeshResult<()> {
        self.send(MeshCommand::DrainNow).await
    }

    pub async fn heal(&self, sid: SecureId) -> MeshResult<()> {
        self.send(MeshCommand::Heal { sid }).await
    }

    /// Explicit gold reassignment. There is no automatic failover.
    pub async fn promote_gold(&self, layer: LayerKind) -> MeshResult<()> {
        self.send(MeshCommand::PromoteGold { layer }).await
    }

    /// Re-enables a session-disabled layer after re-authentication.
    pub async fn re_enable_layer(&self, layer: LayerKind) -> MeshResult<()> {
        self.send(MeshCommand::ReEnableLayer { layer }).await
    }

    /// Signals a local data change; checkpoint writes are debounced.
    pub async fn notify_mutation(&self) -> MeshResult<()> {
        self.send(MeshCommand::NotifyMutation).await
    }

    /// Current status. Never blocks on cloud operations.
    pub fn status(&self) -> SyncStatus {
        self.status.snapshot()
    }
}

/// The background engine. `run()` owns all timers; dropping the engine
/// (or `stop`) clears them, so repeated login/logout cycles never leak.
pub struct MeshEngine {
    orchestrator: Arc<ReplicationOrchestrator>,
    reconciler: Arc<Reconciler>,
    registry: Arc<LayerRegistry>,
    command_rx: mpsc::Receiver<MeshCommand>,
    config: MeshConfig,
    debouncer: CheckpointDebouncer,
}

/// Creates the engine and its command handle.
pub fn create_mesh_engine(
    orchestrator: Arc<ReplicationOrchestrator>,
    reconciler: Arc<Reconciler>,
    status: StatusBoard,
    config: MeshConfig,
) -> (MeshHandle, MeshEngine) {
    let (command_tx, command_rx) = mpsc::channel(64);

    let handle = MeshHandle {
        command_tx,
        status,
    };

    let registry = orchestrator.registry();
    let debouncer = CheckpointDebouncer::new(Duration::from_secs(
        config.checkpoint_debounce_secs,
    ));

    let engine = MeshEngine {
        orchestrator,
        reconciler,
        registry,
        command_rx,
        config,
        debouncer,
    };

    (handle, engine)
}

impl MeshEngine {
    /// Runs the engine event loop until `Stop` or channel close.
    pub async fn run(&mut self) {
        info!("phoenix mesh engine started");

        let mut drain_interval =
            tokio::time::interval(Duration::from_secs(self.config.drain_interval_secs));
        let mut heartbeat_interval =
            tokio::time::interval(Duration::from_secs(self.config.heartbeat_interval_secs));
        let mut debounce_interval = tokio::time::interval(Duration::from_secs(1));

        // Skip first immediate tick
        drain_interval.tick().await;
        heartbeat_interval.tick().await;
        debounce_interval.tick().await;

        loop {
            tokio::select! {
                _ = drain_interval.tick() => {
                    // Each tick is fault-isolated: drain converts its own
                    // failures into an empty report
                    let report = self.orchestrator.drain().await;
                    if report.succeeded + report.still_failing > 0 {
                        debug!(
                            "drain tick: {} recovered, {} still failing",
                            report.succeeded, report.still_failing
                        );
                    }
                }
                _ = heartbeat_interval.tick() => {
                    if !self.orchestrator.force_sync().await {
                        warn!("heartbeat backup did not reach durability");
                    }
                }
                _ = debounce_interval.tick() => {
                    if self.debouncer.should_fire(Instant::now()) {
                        if let Err(e) = self.orchestrator.regenerate_ash_seed().await {
                            warn!("debounced checkpoint write failed: {e}");
                        }
                    }
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(MeshCommand::Stop) => {
                            info!("mesh engine stopping, timers cleared");
                            break;
                        }
                        Some(MeshCommand::ForceSync) => {
                            self.orchestrator.force_sync().await;
                        }
                        Some(MeshCommand::DrainNow) => {
                            let report = self.orchestrator.drain().await;
                            info!(
                                "manual drain: {} recovered, {} still failing",
                                report.succeeded, report.still_failing
                            );
                        }
                        Some(MeshCommand::Heal { sid }) => {
                            let report = self.reconciler.heal(&sid).await;
                            info!(
                                "heal {sid}: healed={} layers_fixed={}",
                                report.healed, report.layers_fixed
                            );
                        }
                        Some(MeshCommand::PromoteGold { layer }) => {
                            self.reconciler.promote_gold(layer).await;
                        }
                        Some(MeshCommand::ReEnableLayer { layer }) => {
                            self.registry.re_enable(layer).await;
                        }
                        Some(MeshCommand::NotifyMutation) => {
                            self.debouncer.note_mutation(Instant::now());
                        }
                        None => {
                            info!("command channel closed, stopping mesh engine");
                            break;
                        }
                    }
                }
            }
        }

        info!("phoenix mesh engine stopped");
    }
}
