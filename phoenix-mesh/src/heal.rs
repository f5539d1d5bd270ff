//! Self-heal reconciliation against the gold layer.
//!
//! Deliberately simple last-writer-from-gold: envelopes are opaque blobs
//! at this level, so a byte-for-byte comparison against the gold copy is
//! the whole divergence test. Gold never moves on its own — if it is
//! durably gone, an operator promotes a new gold explicitly.

use crate::adapter::StorageAdapter;
use crate::registry::LayerRegistry;
use crate::types::HealReport;
use phoenix_types::{LayerKind, SecureId};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Rewrites divergent layers from the gold copy.
pub struct Reconciler {
    adapters: Vec<Arc<dyn StorageAdapter>>,
    registry: Arc<LayerRegistry>,
    gold: RwLock<LayerKind>,
}

impl Reconciler {
    pub fn new(
        adapters: Vec<Arc<dyn StorageAdapter>>,
        registry: Arc<LayerRegistry>,
        gold: LayerKind,
    ) -> Self {
        Self {
            adapters,
            registry,
            gold: RwLock::new(gold),
        }
    }

    pub async fn gold_layer(&self) -> LayerKind {
        *self.gold.read().await
    }

    /// Explicit manual gold reassignment. Never happens automatically —
    /// silent failover risks healing everything from a stale source.
    pub async fn promote_gold(&self, layer: LayerKind) {
        let mut gold = self.gold.write().await;
        if *gold != layer {
            info!("gold layer promoted: {} -> {layer}", *gold);
        }
        *gold = layer;
    }

    /// Reconciles one envelope across layers.
    ///
    /// Aborts without writing anywhere when gold cannot produce the
    /// envelope — heal never synthesizes authority from a non-gold
    /// source.
    pub async fn heal(&self, sid: &SecureId) -> HealReport {
        let gold = *self.gold.read().await;

        let Some(gold_adapter) = self.adapters.iter().find(|a| a.layer() == gold) else {
            return gold_unavailable();
        };
        let Some(gold_envelope) = gold_adapter.pull(sid).await else {
            debug!("heal {sid}: gold layer {gold} has no copy");
            return gold_unavailable();
        };
        if !crate::mapper::verify_integrity(&gold_envelope) {
            // A corrupt gold copy must never be replicated outward
            warn!("heal {sid}: gold envelope failed integrity check");
            return gold_unavailable();
        }
        let gold_bytes = match gold_envelope.canonical_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("heal {sid}: gold envelope unserializable: {e}");
                return gold_unavailable();
            }
        };

        let mut layers_fixed = 0u32;
        for adapter in &self.adapters {
            if adapter.layer() == gold {
                continue;
            }
            if !self.registry.is_enabled(adapter.layer()).await {
                continue;
            }

            let divergent = match adapter.pull(sid).await {
                Some(theirs) => {
                    theirs.canonical_bytes().ok().as_deref() != Some(gold_bytes.as_slice())
                }
                None => true,
            };

            if divergent {
                if adapter.push(&gold_envelope).await {
                    debug!("heal {sid}: rewrote {} from gold", adapter.layer());
                    layers_fixed += 1;
                } else {
                    warn!("heal {sid}: rewrite of {} failed", adapter.layer());
                }
            }
        }

        HealReport {
            healed: true,
            layers_fixed,
            reason: None,
        }
    }
}

fn gold_unavailable() -> HealReport {
    HealReport {
        healed: false,
        layers_fixed: 0,
        reason: Some("gold unavailable".to_string()),
    }
}
