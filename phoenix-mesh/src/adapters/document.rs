//! Document vault adapter — the primary remote document store.
//!
//! Envelopes are stored one per document under their `sid`. Full-dataset
//! snapshots are written in the chunked `meta` + `chunks/{index}` layout
//! because the backend caps per-document size; binary fields are dropped
//! from snapshots by policy (this layer is the text-only fallback).

use crate::adapter::StorageAdapter;
use crate::error::permanent_status;
use crate::registry::LayerRegistry;
use crate::snapshot::{assemble_snapshot, chunk_snapshot, strip_binary_fields};
use async_trait::async_trait;
use phoenix_types::{DatasetSnapshot, Envelope, LayerKind, SecureId, SnapshotChunk, SnapshotMeta};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP/JSON document-store adapter.
pub struct DocumentVaultAdapter {
    client: Client,
    base_url: String,
    api_token: String,
    chunk_size: usize,
    registry: Arc<LayerRegistry>,
}

impl DocumentVaultAdapter {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        chunk_size: usize,
        timeout: Duration,
        registry: Arc<LayerRegistry>,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            api_token: api_token.into(),
            chunk_size,
            registry,
        }
    }

    /// PUTs a JSON document, classifying failures into the registry.
    async fn put_json(&self, path: &str, body: &impl Serialize) -> bool {
        let url = format!("{}/{path}", self.base_url);
        match self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .json(body)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                self.registry.mark_success(LayerKind::Document).await;
                true
            }
            Ok(resp) if permanent_status(resp.status()) => {
                self.registry
                    .disable_for_session(
                        LayerKind::Document,
                        &format!("document vault rejected credentials ({})", resp.status()),
                    )
                    .await;
                false
            }
            Ok(resp) => {
                self.registry
                    .mark_transient_failure(
                        LayerKind::Document,
                        &format!("HTTP {} writing {path}", resp.status()),
                    )
                    .await;
                false
            }
            Err(e) => {
                self.registry
                    .mark_transient_failure(LayerKind::Document, &format!("write {path}: {e}"))
                    .await;
                false
            }
        }
    }

    /// GETs a JSON document. `None` covers missing, unreachable, and
    /// unparseable alike.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let url = format!("{}/{path}", self.base_url);
        let resp = match self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                self.registry
                    .mark_transient_failure(LayerKind::Document, &format!("read {path}: {e}"))
                    .await;
                return None;
            }
        };

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            // Reachable, just empty
            self.registry.mark_success(LayerKind::Document).await;
            return None;
        }
        if permanent_status(resp.status()) {
            self.registry
                .disable_for_session(
                    LayerKind::Document,
                    &format!("document vault rejected credentials ({})", resp.status()),
                )
                .await;
            return None;
        }
        if !resp.status().is_success() {
            self.registry
                .mark_transient_failure(
                    LayerKind::Document,
                    &format!("HTTP {} reading {path}", resp.status()),
                )
                .await;
            return None;
        }

        match resp.json::<T>().await {
            Ok(value) => {
                self.registry.mark_success(LayerKind::Document).await;
                Some(value)
            }
            Err(e) => {
                warn!("document vault returned malformed JSON at {path}: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl StorageAdapter for DocumentVaultAdapter {
    fn layer(&self) -> LayerKind {
        LayerKind::Document
    }

    async fn push(&self, envelope: &Envelope) -> bool {
        self.put_json(&format!("envelopes/{}", envelope.header.sid), envelope)
            .await
    }

    async fn pull(&self, sid: &SecureId) -> Option<Envelope> {
        self.get_json(&format!("envelopes/{sid}")).await
    }

    async fn push_snapshot(&self, snapshot: &DatasetSnapshot) -> bool {
        // Text-only by policy: photos and other binary fields stay out
        let text_only = strip_binary_fields(snapshot);
        let (meta, chunks) = chunk_snapshot(&text_only, self.chunk_size);

        for chunk in &chunks {
            if !self
                .put_json(&format!("backup/chunks/{}", chunk.chunk_index), chunk)
                .await
            {
                return false;
            }
        }
        // Meta written last so a readable meta always points at a
        // complete chunk set
        if !self.put_json("backup/meta", &meta).await {
            return false;
        }

        debug!(
            "document vault snapshot written: {} students in {} chunks",
            meta.total_students, meta.total_chunks
        );
        true
    }

    async fn pull_snapshot(&self) -> Option<DatasetSnapshot> {
        let meta: SnapshotMeta = self.get_json("backup/meta").await?;

        let mut chunks = Vec::with_capacity(meta.total_chunks as usize);
        for index in 0..meta.total_chunks {
            match self
                .get_json::<SnapshotChunk>(&format!("backup/chunks/{index}"))
                .await
            {
                Some(chunk) => chunks.push(chunk),
                None => {
                    warn!("document vault snapshot missing chunk {index}");
                    return None;
                }
            }
        }

        Some(assemble_snapshot(meta, chunks))
    }
}
