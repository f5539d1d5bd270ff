//! Object vault adapter — S3-compatible blob storage.
//!
//! Envelopes are stored as one object per `sid`; the dataset snapshot is
//! a single object (object storage has no per-document size cap to chunk
//! around). The client is rebuilt from session credentials per call, so
//! credential rotation never requires adapter reconstruction.

use crate::adapter::StorageAdapter;
use crate::registry::LayerRegistry;
use crate::types::ObjectCredentials;
use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use phoenix_types::{DatasetSnapshot, Envelope, LayerKind, SecureId};
use std::sync::Arc;
use tracing::{debug, warn};

/// S3 error codes that mean the credential is dead for this session.
const PERMANENT_CODES: [&str; 4] = [
    "ExpiredToken",
    "InvalidAccessKeyId",
    "AccessDenied",
    "SignatureDoesNotMatch",
];

/// S3-backed object store adapter.
pub struct ObjectVaultAdapter {
    bucket: String,
    region: String,
    endpoint_override: Option<String>,
    prefix: String,
    credentials: ObjectCredentials,
    registry: Arc<LayerRegistry>,
}

impl ObjectVaultAdapter {
    pub fn new(
        bucket: String,
        region: String,
        endpoint_override: Option<String>,
        prefix: String,
        credentials: ObjectCredentials,
        registry: Arc<LayerRegistry>,
    ) -> Self {
        Self {
            bucket,
            region,
            endpoint_override,
            prefix,
            credentials,
            registry,
        }
    }

    fn build_client(&self) -> S3Client {
        let credentials = aws_credential_types::Credentials::new(
            &self.credentials.access_key_id,
            &self.credentials.secret_access_key,
            self.credentials.session_token.clone(),
            None,
            "phoenix-object-vault",
        );

        let mut config_builder = aws_sdk_s3::Config::builder()
            .region(aws_types::region::Region::new(self.region.clone()))
            .credentials_provider(credentials)
            .behavior_version_latest();

        if let Some(ref endpoint) = self.endpoint_override {
            config_builder = config_builder.endpoint_url(endpoint).force_path_style(true);
        }

        S3Client::from_conf(config_builder.build())
    }

    fn envelope_key(&self, sid: &SecureId) -> String {
        format!("{}/envelopes/{sid}.json", self.prefix)
    }

    fn snapshot_key(&self) -> String {
        format!("{}/snapshots/latest.json", self.prefix)
    }

    /// Expired credentials are a permanent failure before any call is
    /// even attempted.
    async fn guard_credentials(&self) -> bool {
        if self.credentials.is_expired() {
            self.registry
                .disable_for_session(LayerKind::Object, "object vault credentials expired")
                .await;
            return false;
        }
        true
    }

    async fn classify_sdk_error<E, R>(&self, context: &str, e: &aws_sdk_s3::error::SdkError<E, R>)
    where
        E: ProvideErrorMetadata,
        aws_sdk_s3::error::SdkError<E, R>: std::fmt::Display,
    {
        let code = e.code().unwrap_or("");
        if PERMANENT_CODES.contains(&code) {
            self.registry
                .disable_for_session(
                    LayerKind::Object,
                    &format!("object vault rejected credentials ({code})"),
                )
                .await;
        } else {
            self.registry
                .mark_transient_failure(LayerKind::Object, &format!("{context}: {e}"))
                .await;
        }
    }

    async fn put_object(&self, key: &str, data: Vec<u8>) -> bool {
        if !self.guard_credentials().await {
            return false;
        }
        let client = self.build_client();
        let size = data.len();

        match client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
        {
            Ok(_) => {
                self.registry.mark_success(LayerKind::Object).await;
                debug!("uploaded {size} bytes to s3://{}/{key}", self.bucket);
                true
            }
            Err(e) => {
                self.classify_sdk_error(&format!("upload {key}"), &e).await;
                false
            }
        }
    }

    async fn get_object(&self, key: &str) -> Option<Vec<u8>> {
        if !self.guard_credentials().await {
            return None;
        }
        let client = self.build_client();

        let resp = match client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                if e.code() == Some("NoSuchKey") {
                    // Reachable, just empty
                    self.registry.mark_success(LayerKind::Object).await;
                } else {
                    self.classify_sdk_error(&format!("download {key}"), &e).await;
                }
                return None;
            }
        };

        match resp.body.collect().await {
            Ok(body) => {
                self.registry.mark_success(LayerKind::Object).await;
                Some(body.into_bytes().to_vec())
            }
            Err(e) => {
                self.registry
                    .mark_transient_failure(
                        LayerKind::Object,
                        &format!("failed to read body for {key}: {e}"),
                    )
                    .await;
                None
            }
        }
    }
}

#[async_trait]
impl StorageAdapter for ObjectVaultAdapter {
    fn layer(&self) -> LayerKind {
        LayerKind::Object
    }

    async fn push(&self, envelope: &Envelope) -> bool {
        let bytes = match envelope.canonical_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("envelope serialization failed for object vault: {e}");
                return false;
            }
        };
        self.put_object(&self.envelope_key(&envelope.header.sid), bytes)
            .await
    }

    async fn pull(&self, sid: &SecureId) -> Option<Envelope> {
        let bytes = self.get_object(&self.envelope_key(sid)).await?;
        match serde_json::from_slice(&bytes) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!("object vault returned malformed envelope for {sid}: {e}");
                None
            }
        }
    }

    async fn push_snapshot(&self, snapshot: &DatasetSnapshot) -> bool {
        let bytes = match serde_json::to_vec(snapshot) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("snapshot serialization failed for object vault: {e}");
                return false;
            }
        };
        self.put_object(&self.snapshot_key(), bytes).await
    }

    async fn pull_snapshot(&self) -> Option<DatasetSnapshot> {
        let bytes = self.get_object(&self.snapshot_key()).await?;
        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("object vault returned malformed snapshot: {e}");
                None
            }
        }
    }
}
