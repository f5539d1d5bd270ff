//! Rebirth — cold-start restore from whichever layer still holds data.
//!
//! Strict priority chain, first non-empty result wins, nothing retried
//! after a success: full-fidelity drive, then the text-only document
//! vault (an accepted lossy degradation — binary fields were dropped at
//! backup time by policy), then the local Life-Pod. Finding nothing
//! anywhere is the normal terminal state for a brand-new installation.

use crate::adapter::StorageAdapter;
use crate::checkpoint;
use crate::error::MeshResult;
use crate::registry::LayerRegistry;
use crate::types::{RestoreReport, RestoreSource, StatusBoard, SyncPhase};
use phoenix_storage::{MetaStore, RecordStore};
use phoenix_types::{DatasetSnapshot, Record};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Restores an empty local store from the priority chain.
pub struct RestoreCoordinator {
    /// Remote sources in priority order.
    chain: Vec<(RestoreSource, Arc<dyn StorageAdapter>)>,
    registry: Arc<LayerRegistry>,
    records: RecordStore,
    meta: MetaStore,
    status: StatusBoard,
}

impl RestoreCoordinator {
    pub fn new(
        chain: Vec<(RestoreSource, Arc<dyn StorageAdapter>)>,
        registry: Arc<LayerRegistry>,
        records: RecordStore,
        meta: MetaStore,
        status: StatusBoard,
    ) -> Self {
        Self {
            chain,
            registry,
            records,
            meta,
            status,
        }
    }

    /// Attempts restore. Call when the local store is observed empty at
    /// startup; a non-empty store short-circuits untouched.
    pub async fn restore(&self) -> RestoreReport {
        match self.records.count_records() {
            Ok(0) => {}
            Ok(existing) => {
                debug!("local store already holds {existing} records, restore skipped");
                return RestoreReport {
                    source: None,
                    record_count: existing,
                };
            }
            Err(e) => {
                warn!("local store unreadable before restore: {e}");
                return RestoreReport {
                    source: None,
                    record_count: 0,
                };
            }
        }

        for (source, adapter) in &self.chain {
            if !self.registry.is_enabled(adapter.layer()).await {
                debug!("restore: {} layer session-disabled, skipping", adapter.layer());
                continue;
            }

            // The adapter session-disables itself on an invalid session;
            // either way a failed pull means "try the next layer"
            match adapter.pull_snapshot().await {
                Some(snapshot) if !snapshot.is_empty() => {
                    return self.finish(*source, &snapshot).await;
                }
                Some(_) => debug!("restore: {source} returned an empty snapshot"),
                None => debug!("restore: {source} has no snapshot"),
            }
        }

        // Last resort: the Life-Pod persisted beside the Ash Seed
        match self.meta.load_life_pod() {
            Ok(Some(pod)) if !pod.is_empty() => {
                return self.finish(RestoreSource::LocalPod, &pod).await;
            }
            Ok(_) => {}
            Err(e) => warn!("life-pod unreadable: {e}"),
        }

        // Nothing anywhere. The seed tells us whether that is expected.
        match self.meta.load_ash_seed() {
            Ok(Some(seed)) if seed.total_records() > 0 => {
                warn!(
                    "checkpoint says {} records should exist but no layer produced data",
                    seed.total_records()
                );
                self.status.set(
                    SyncPhase::Warning,
                    "backup data should exist but no source is reachable",
                );
            }
            _ => {
                info!("no data found in any layer — treating as new installation");
                self.status.set(SyncPhase::Idle, "no data found");
            }
        }

        RestoreReport {
            source: None,
            record_count: 0,
        }
    }

    async fn finish(&self, source: RestoreSource, snapshot: &DatasetSnapshot) -> RestoreReport {
        let record_count = match import_snapshot(&self.records, snapshot) {
            Ok(count) => count,
            Err(e) => {
                warn!("import from {source} failed: {e}");
                self.status
                    .set(SyncPhase::Error, format!("restore from {source} failed"));
                return RestoreReport {
                    source: None,
                    record_count: 0,
                };
            }
        };

        // Regenerate the seed now so the next restart skips the probing
        let availability = self.registry.availability().await;
        match checkpoint::build_ash_seed(&self.records, availability) {
            Ok(seed) => {
                if let Err(e) = self.meta.save_ash_seed(&seed) {
                    warn!("checkpoint write after restore failed: {e}");
                }
            }
            Err(e) => warn!("checkpoint rebuild after restore failed: {e}"),
        }

        info!("restored {record_count} records from {source}");
        self.status
            .set(SyncPhase::Success, format!("restored from {source}"));
        RestoreReport {
            source: Some(source),
            record_count,
        }
    }
}

/// Imports a snapshot into the local store. Returns how many records
/// were written.
pub fn import_snapshot(records: &RecordStore, snapshot: &DatasetSnapshot) -> MeshResult<u64> {
    let mut imported = 0u64;

    for (index, student) in snapshot.students.iter().enumerate() {
        let id = embedded_id(student)
            .unwrap_or_else(|| format!("restored_student_{index}"));
        records.save_record(&Record::new("student", Some(id), student.clone()))?;
        imported += 1;
    }

    for (index, category) in snapshot.categories.iter().enumerate() {
        let id = embedded_id(category)
            .unwrap_or_else(|| format!("restored_category_{index}"));
        records.save_record(&Record::new("category", Some(id), category.clone()))?;
        imported += 1;
    }

    if !snapshot.settings.is_null() {
        records.save_record(&Record::new(
            "settings",
            Some("settings".to_string()),
            snapshot.settings.clone(),
        ))?;
        imported += 1;
    }

    Ok(imported)
}

fn embedded_id(value: &Value) -> Option<String> {
    match value.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => match value.get("admissionNo") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        },
    }
}
