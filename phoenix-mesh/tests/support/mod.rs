//! Shared test helpers: in-memory adapters and engine wiring.
#![allow(dead_code)]

use async_trait::async_trait;
use phoenix_crypto::{CryptoError, CryptoProvider, CryptoResult, PassthroughCrypto};
use phoenix_mesh::adapter::StorageAdapter;
use phoenix_mesh::mapper::EnvelopeMapper;
use phoenix_mesh::registry::LayerRegistry;
use phoenix_mesh::types::StatusBoard;
use phoenix_mesh::{MeshConfig, ReplicationOrchestrator};
use phoenix_storage::{MetaStore, QueueStore, RecordStore};
use phoenix_types::{DatasetSnapshot, Envelope, LayerKind, Record, SecureId};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory adapter with scriptable failure behavior and call counters.
pub struct MockAdapter {
    layer: LayerKind,
    registry: Arc<LayerRegistry>,
    accept: AtomicBool,
    /// When set, the next call reports a permanent (auth) failure.
    revoked: AtomicBool,
    pub push_calls: AtomicUsize,
    pub pull_calls: AtomicUsize,
    pub snapshot_pushes: AtomicUsize,
    envelopes: Mutex<HashMap<String, Envelope>>,
    snapshot: Mutex<Option<DatasetSnapshot>>,
}

impl MockAdapter {
    pub fn accepting(layer: LayerKind, registry: Arc<LayerRegistry>) -> Arc<Self> {
        Arc::new(Self {
            layer,
            registry,
            accept: AtomicBool::new(true),
            revoked: AtomicBool::new(false),
            push_calls: AtomicUsize::new(0),
            pull_calls: AtomicUsize::new(0),
            snapshot_pushes: AtomicUsize::new(0),
            envelopes: Mutex::new(HashMap::new()),
            snapshot: Mutex::new(None),
        })
    }

    /// Transiently failing adapter (network blip).
    pub fn rejecting(layer: LayerKind, registry: Arc<LayerRegistry>) -> Arc<Self> {
        let adapter = Self::accepting(layer, registry);
        adapter.accept.store(false, Ordering::SeqCst);
        adapter
    }

    /// Permanently failing adapter (revoked credential).
    pub fn revoked(layer: LayerKind, registry: Arc<LayerRegistry>) -> Arc<Self> {
        let adapter = Self::accepting(layer, registry);
        adapter.revoked.store(true, Ordering::SeqCst);
        adapter
    }

    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn push_count(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, sid: &SecureId) -> bool {
        self.envelopes.lock().unwrap().contains_key(sid.as_str())
    }

    pub fn stored(&self, sid: &SecureId) -> Option<Envelope> {
        self.envelopes.lock().unwrap().get(sid.as_str()).cloned()
    }

    pub fn insert(&self, envelope: Envelope) {
        self.envelopes
            .lock()
            .unwrap()
            .insert(envelope.header.sid.as_str().to_string(), envelope);
    }

    pub fn envelope_count(&self) -> usize {
        self.envelopes.lock().unwrap().len()
    }

    pub fn set_snapshot(&self, snapshot: DatasetSnapshot) {
        *self.snapshot.lock().unwrap() = Some(snapshot);
    }

    pub fn stored_snapshot(&self) -> Option<DatasetSnapshot> {
        self.snapshot.lock().unwrap().clone()
    }

    async fn fail_if_scripted(&self) -> bool {
        if self.revoked.load(Ordering::SeqCst) {
            self.registry
                .disable_for_session(self.layer, "credentials revoked")
                .await;
            return true;
        }
        if !self.accept.load(Ordering::SeqCst) {
            self.registry
                .mark_transient_failure(self.layer, "simulated network failure")
                .await;
            return true;
        }
        false
    }
}

#[async_trait]
impl StorageAdapter for MockAdapter {
    fn layer(&self) -> LayerKind {
        self.layer
    }

    async fn push(&self, envelope: &Envelope) -> bool {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_if_scripted().await {
            return false;
        }
        self.insert(envelope.clone());
        self.registry.mark_success(self.layer).await;
        true
    }

    async fn pull(&self, sid: &SecureId) -> Option<Envelope> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_if_scripted().await {
            return None;
        }
        self.registry.mark_success(self.layer).await;
        self.envelopes.lock().unwrap().get(sid.as_str()).cloned()
    }

    async fn push_snapshot(&self, snapshot: &DatasetSnapshot) -> bool {
        self.snapshot_pushes.fetch_add(1, Ordering::SeqCst);
        if self.fail_if_scripted().await {
            return false;
        }
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
        self.registry.mark_success(self.layer).await;
        true
    }

    async fn pull_snapshot(&self) -> Option<DatasetSnapshot> {
        if self.fail_if_scripted().await {
            return None;
        }
        self.registry.mark_success(self.layer).await;
        self.snapshot.lock().unwrap().clone()
    }
}

/// Crypto provider whose payload operations always fail. Blind indexing
/// still works, which is exactly the failure shape of a locked vault.
pub struct FailingCrypto;

impl CryptoProvider for FailingCrypto {
    fn is_available(&self) -> bool {
        true
    }

    fn encrypt_bytes(&self, _plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        Err(CryptoError::Encryption)
    }

    fn decrypt_bytes(&self, _ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        Err(CryptoError::Decryption)
    }

    fn blind_index(&self, identifier: &str) -> String {
        phoenix_crypto::blind_index("test", identifier)
    }
}

/// Everything a mesh test needs, wired over in-memory stores.
pub struct TestMesh {
    pub orchestrator: ReplicationOrchestrator,
    pub registry: Arc<LayerRegistry>,
    pub records: RecordStore,
    pub queue: QueueStore,
    pub meta: MetaStore,
    pub status: StatusBoard,
}

/// Builds an orchestrator over the given adapters with default config.
pub fn build_mesh(
    adapters: Vec<Arc<dyn StorageAdapter>>,
    registry: Arc<LayerRegistry>,
    config: MeshConfig,
) -> TestMesh {
    let records = RecordStore::open_in_memory().unwrap();
    let queue = QueueStore::open_in_memory().unwrap();
    let meta = MetaStore::open_in_memory().unwrap();
    let status = StatusBoard::new();

    let mapper = EnvelopeMapper::new(Arc::new(PassthroughCrypto), queue.clone());
    let orchestrator = ReplicationOrchestrator::new(
        mapper,
        adapters,
        registry.clone(),
        records.clone(),
        queue.clone(),
        meta.clone(),
        config,
        status.clone(),
        None,
    );

    TestMesh {
        orchestrator,
        registry,
        records,
        queue,
        meta,
        status,
    }
}

/// A student record with natural keys.
pub fn student(id: &str, name: &str) -> Record {
    Record::new(
        "student",
        Some(id.to_string()),
        json!({ "name": name, "admissionNo": id, "email": format!("{id}@school.test") }),
    )
}

/// Three accepting adapters, one per layer.
pub fn three_accepting(
    registry: &Arc<LayerRegistry>,
) -> (Arc<MockAdapter>, Arc<MockAdapter>, Arc<MockAdapter>) {
    (
        MockAdapter::accepting(LayerKind::Document, registry.clone()),
        MockAdapter::accepting(LayerKind::Object, registry.clone()),
        MockAdapter::accepting(LayerKind::Drive, registry.clone()),
    )
}

pub fn as_dyn(adapter: &Arc<MockAdapter>) -> Arc<dyn StorageAdapter> {
    adapter.clone()
}
