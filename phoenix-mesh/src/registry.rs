//! Per-layer health state.
//!
//! One `LayerRegistry` instance per process (injected, never a module
//! global, so tests can reset between cases). The asymmetry is the point:
//! transient failures clear on the next success and retry every cycle;
//! permanent auth/permission failures stick for the whole session so a
//! backend that will keep rejecting is not hammered until the user
//! re-authenticates out of band.

use phoenix_types::LayerKind;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Health of a single layer.
#[derive(Clone, Debug, Default)]
pub struct LayerHealth {
    pub session_disabled: bool,
    pub disabled_reason: Option<String>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

/// Process-lifetime health registry for all layers.
pub struct LayerRegistry {
    inner: RwLock<BTreeMap<LayerKind, LayerHealth>>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        let mut map = BTreeMap::new();
        for layer in LayerKind::ALL {
            map.insert(layer, LayerHealth::default());
        }
        Self {
            inner: RwLock::new(map),
        }
    }

    pub async fn is_enabled(&self, layer: LayerKind) -> bool {
        let map = self.inner.read().await;
        map.get(&layer).is_none_or(|h| !h.session_disabled)
    }

    /// Layers not session-disabled, in dispatch order.
    pub async fn enabled_layers(&self) -> Vec<LayerKind> {
        let map = self.inner.read().await;
        LayerKind::ALL
            .into_iter()
            .filter(|l| map.get(l).is_none_or(|h| !h.session_disabled))
            .collect()
    }

    /// Sticky disable after a permanent failure. Idempotent; never
    /// auto-cleared.
    pub async fn disable_for_session(&self, layer: LayerKind, reason: &str) {
        let mut map = self.inner.write().await;
        let health = map.entry(layer).or_default();
        if !health.session_disabled {
            warn!("{layer} layer disabled for this session: {reason}");
        }
        health.session_disabled = true;
        health.disabled_reason = Some(reason.to_string());
        health.last_error = Some(reason.to_string());
    }

    /// Transient failure: counted for this cycle, no lasting penalty.
    pub async fn mark_transient_failure(&self, layer: LayerKind, error: &str) {
        let mut map = self.inner.write().await;
        let health = map.entry(layer).or_default();
        health.consecutive_failures += 1;
        health.last_error = Some(error.to_string());
        debug!(
            "{layer} layer transient failure #{}: {error}",
            health.consecutive_failures
        );
    }

    pub async fn mark_success(&self, layer: LayerKind) {
        let mut map = self.inner.write().await;
        let health = map.entry(layer).or_default();
        health.consecutive_failures = 0;
        health.last_error = None;
    }

    /// Explicit re-enable after the user re-authenticates.
    pub async fn re_enable(&self, layer: LayerKind) {
        let mut map = self.inner.write().await;
        let health = map.entry(layer).or_default();
        if health.session_disabled {
            info!("{layer} layer re-enabled");
        }
        *health = LayerHealth::default();
    }

    /// Per-layer reachability as last observed: enabled and not mid-blip.
    pub async fn availability(&self) -> BTreeMap<LayerKind, bool> {
        let map = self.inner.read().await;
        LayerKind::ALL
            .into_iter()
            .map(|l| {
                let ok = map
                    .get(&l)
                    .is_none_or(|h| !h.session_disabled && h.consecutive_failures == 0);
                (l, ok)
            })
            .collect()
    }

    pub async fn health(&self, layer: LayerKind) -> LayerHealth {
        let map = self.inner.read().await;
        map.get(&layer).cloned().unwrap_or_default()
    }
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
