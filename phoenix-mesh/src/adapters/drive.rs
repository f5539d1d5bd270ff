//! Drive vault adapter — the third-party cloud drive.
//!
//! The drive gateway requires an authenticated session. Session
//! establishment is the one network call in this system that has
//! historically hung; it is wrapped in an explicit timeout and a timeout
//! counts as transient. A rejected refresh token is permanent and
//! session-disables the layer until the user re-authenticates.
//!
//! Snapshots here are full fidelity (photos included) and use the shared
//! chunked `meta` + `chunks/{index}` contract.

use crate::adapter::StorageAdapter;
use crate::error::permanent_status;
use crate::registry::LayerRegistry;
use crate::snapshot::{assemble_snapshot, chunk_snapshot};
use crate::types::DriveSession;
use async_trait::async_trait;
use phoenix_types::{DatasetSnapshot, Envelope, LayerKind, SecureId, SnapshotChunk, SnapshotMeta};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Refresh the session this many seconds before expiry.
const SESSION_REFRESH_MARGIN_SECS: i64 = 60;

/// Third-party drive adapter with a cached session.
pub struct DriveVaultAdapter {
    client: Client,
    gateway_url: String,
    refresh_token: String,
    session: RwLock<Option<DriveSession>>,
    session_timeout: Duration,
    chunk_size: usize,
    registry: Arc<LayerRegistry>,
}

impl DriveVaultAdapter {
    pub fn new(
        gateway_url: impl Into<String>,
        refresh_token: impl Into<String>,
        chunk_size: usize,
        call_timeout: Duration,
        session_timeout: Duration,
        registry: Arc<LayerRegistry>,
    ) -> Self {
        let client = Client::builder()
            .timeout(call_timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            gateway_url: gateway_url.into(),
            refresh_token: refresh_token.into(),
            session: RwLock::new(None),
            session_timeout,
            chunk_size,
            registry,
        }
    }

    /// Returns a valid access token, establishing or refreshing the
    /// session as needed. `None` means this call cannot proceed; the
    /// registry already reflects why.
    async fn ensure_session(&self) -> Option<String> {
        {
            let session = self.session.read().await;
            if let Some(ref s) = *session {
                if !s.expires_within_secs(SESSION_REFRESH_MARGIN_SECS) {
                    return Some(s.access_token.clone());
                }
                debug!("drive session expiring, refreshing");
            }
        }

        let request = self
            .client
            .post(format!("{}/session", self.gateway_url))
            .json(&serde_json::json!({ "refreshToken": self.refresh_token }))
            .send();

        let resp = match tokio::time::timeout(self.session_timeout, request).await {
            Err(_) => {
                self.registry
                    .mark_transient_failure(
                        LayerKind::Drive,
                        "session establishment timed out",
                    )
                    .await;
                return None;
            }
            Ok(Err(e)) => {
                self.registry
                    .mark_transient_failure(LayerKind::Drive, &format!("session: {e}"))
                    .await;
                return None;
            }
            Ok(Ok(resp)) => resp,
        };

        if permanent_status(resp.status()) {
            self.registry
                .disable_for_session(
                    LayerKind::Drive,
                    &format!("drive refresh token rejected ({})", resp.status()),
                )
                .await;
            return None;
        }
        if !resp.status().is_success() {
            self.registry
                .mark_transient_failure(
                    LayerKind::Drive,
                    &format!("session HTTP {}", resp.status()),
                )
                .await;
            return None;
        }

        match resp.json::<DriveSession>().await {
            Ok(new_session) => {
                let token = new_session.access_token.clone();
                *self.session.write().await = Some(new_session);
                self.registry.mark_success(LayerKind::Drive).await;
                Some(token)
            }
            Err(e) => {
                self.registry
                    .mark_transient_failure(LayerKind::Drive, &format!("session parse: {e}"))
                    .await;
                None
            }
        }
    }

    async fn put_file(&self, path: &str, body: &impl Serialize) -> bool {
        let Some(token) = self.ensure_session().await else {
            return false;
        };

        let url = format!("{}/files/{path}", self.gateway_url);
        match self
            .client
            .put(&url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                self.registry.mark_success(LayerKind::Drive).await;
                true
            }
            Ok(resp) if permanent_status(resp.status()) => {
                // Session was valid moments ago; the grant itself is gone
                self.registry
                    .disable_for_session(
                        LayerKind::Drive,
                        &format!("drive access revoked ({})", resp.status()),
                    )
                    .await;
                false
            }
            Ok(resp) => {
                self.registry
                    .mark_transient_failure(
                        LayerKind::Drive,
                        &format!("HTTP {} writing {path}", resp.status()),
                    )
                    .await;
                false
            }
            Err(e) => {
                self.registry
                    .mark_transient_failure(LayerKind::Drive, &format!("write {path}: {e}"))
                    .await;
                false
            }
        }
    }

    async fn get_file<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let token = self.ensure_session().await?;

        let url = format!("{}/files/{path}", self.gateway_url);
        let resp = match self.client.get(&url).bearer_auth(&token).send().await {
            Ok(resp) => resp,
            Err(e) => {
                self.registry
                    .mark_transient_failure(LayerKind::Drive, &format!("read {path}: {e}"))
                    .await;
                return None;
            }
        };

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            self.registry.mark_success(LayerKind::Drive).await;
            return None;
        }
        if permanent_status(resp.status()) {
            self.registry
                .disable_for_session(
                    LayerKind::Drive,
                    &format!("drive access revoked ({})", resp.status()),
                )
                .await;
            return None;
        }
        if !resp.status().is_success() {
            self.registry
                .mark_transient_failure(
                    LayerKind::Drive,
                    &format!("HTTP {} reading {path}", resp.status()),
                )
                .await;
            return None;
        }

        match resp.json::<T>().await {
            Ok(value) => {
                self.registry.mark_success(LayerKind::Drive).await;
                Some(value)
            }
            Err(e) => {
                warn!("drive returned malformed JSON at {path}: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl StorageAdapter for DriveVaultAdapter {
    fn layer(&self) -> LayerKind {
        LayerKind::Drive
    }

    async fn push(&self, envelope: &Envelope) -> bool {
        self.put_file(&format!("envelopes/{}", envelope.header.sid), envelope)
            .await
    }

    async fn pull(&self, sid: &SecureId) -> Option<Envelope> {
        self.get_file(&format!("envelopes/{sid}")).await
    }

    async fn push_snapshot(&self, snapshot: &DatasetSnapshot) -> bool {
        // Full fidelity: the drive is the binary-capable backup path
        let (meta, chunks) = chunk_snapshot(snapshot, self.chunk_size);

        for chunk in &chunks {
            if !self
                .put_file(&format!("backup/chunks/{}", chunk.chunk_index), chunk)
                .await
            {
                return false;
            }
        }
        if !self.put_file("backup/meta", &meta).await {
            return false;
        }

        debug!(
            "drive snapshot written: {} students in {} chunks",
            meta.total_students, meta.total_chunks
        );
        true
    }

    async fn pull_snapshot(&self) -> Option<DatasetSnapshot> {
        let meta: SnapshotMeta = self.get_file("backup/meta").await?;

        let mut chunks = Vec::with_capacity(meta.total_chunks as usize);
        for index in 0..meta.total_chunks {
            match self
                .get_file::<SnapshotChunk>(&format!("backup/chunks/{index}"))
                .await
            {
                Some(chunk) => chunks.push(chunk),
                None => {
                    warn!("drive snapshot missing chunk {index}");
                    return None;
                }
            }
        }

        Some(assemble_snapshot(meta, chunks))
    }
}
