//! Document vault adapter tests against a mock HTTP backend.

use chrono::Utc;
use phoenix_mesh::adapter::StorageAdapter;
use phoenix_mesh::adapters::DocumentVaultAdapter;
use phoenix_mesh::registry::LayerRegistry;
use phoenix_types::{
    DatasetSnapshot, Envelope, EnvelopeHeader, LayerKind, SecureId, ENVELOPE_SCHEMA_VERSION,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn make_envelope(sid: &str) -> Envelope {
    Envelope {
        header: EnvelopeHeader {
            sid: SecureId::from_digest(sid.to_string()),
            v: ENVELOPE_SCHEMA_VERSION.to_string(),
            record_type_ct: "Y3Q=".to_string(),
            ts: Utc::now(),
            integrity: "deadbeef".to_string(),
        },
        body: "b3BhcXVl".to_string(),
    }
}

fn adapter(server: &MockServer, registry: Arc<LayerRegistry>) -> DocumentVaultAdapter {
    DocumentVaultAdapter::new(
        server.uri(),
        "service-token",
        200,
        Duration::from_secs(5),
        registry,
    )
}

#[tokio::test]
async fn push_returns_true_on_acceptance() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/envelopes/sid-a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let registry = Arc::new(LayerRegistry::new());
    let adapter = adapter(&server, registry.clone());

    assert!(adapter.push(&make_envelope("sid-a")).await);
    assert!(registry.is_enabled(LayerKind::Document).await);
}

#[tokio::test]
async fn push_on_401_session_disables_the_layer() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let registry = Arc::new(LayerRegistry::new());
    let adapter = adapter(&server, registry.clone());

    assert!(!adapter.push(&make_envelope("sid-a")).await);
    assert!(!registry.is_enabled(LayerKind::Document).await);

    let health = registry.health(LayerKind::Document).await;
    assert!(health.disabled_reason.unwrap().contains("401"));
}

#[tokio::test]
async fn push_on_500_is_transient_only() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let registry = Arc::new(LayerRegistry::new());
    let adapter = adapter(&server, registry.clone());

    assert!(!adapter.push(&make_envelope("sid-a")).await);
    // Still enabled — retried next cycle
    assert!(registry.is_enabled(LayerKind::Document).await);
    assert_eq!(
        registry.health(LayerKind::Document).await.consecutive_failures,
        1
    );
}

#[tokio::test]
async fn pull_round_trips_an_envelope() {
    let server = MockServer::start().await;
    let envelope = make_envelope("sid-a");
    Mock::given(method("GET"))
        .and(path("/envelopes/sid-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&envelope))
        .mount(&server)
        .await;

    let registry = Arc::new(LayerRegistry::new());
    let adapter = adapter(&server, registry);

    let pulled = adapter
        .pull(&SecureId::from_digest("sid-a".into()))
        .await
        .unwrap();
    assert_eq!(pulled.header.sid, envelope.header.sid);
    assert_eq!(pulled.body, envelope.body);
}

#[tokio::test]
async fn pull_missing_and_unreachable_both_return_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let registry = Arc::new(LayerRegistry::new());
    let adapter = adapter(&server, registry.clone());

    // Missing: None, layer stays healthy
    assert!(adapter.pull(&SecureId::from_digest("nope".into())).await.is_none());
    assert!(registry.is_enabled(LayerKind::Document).await);

    // Unreachable: also None, callers cannot tell the difference
    drop(server);
    assert!(adapter.pull(&SecureId::from_digest("nope".into())).await.is_none());
    assert!(registry.is_enabled(LayerKind::Document).await);
}

#[tokio::test]
async fn snapshot_push_writes_chunks_then_meta() {
    let server = MockServer::start().await;
    for index in 0..3 {
        Mock::given(method("PUT"))
            .and(path(format!("/backup/chunks/{index}")))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("PUT"))
        .and(path("/backup/meta"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let registry = Arc::new(LayerRegistry::new());
    let adapter = adapter(&server, registry);

    let mut snapshot = DatasetSnapshot::empty(Utc::now());
    snapshot.students = (0..450).map(|i| json!({ "id": format!("s-{i}") })).collect();

    assert!(adapter.push_snapshot(&snapshot).await);
}

#[tokio::test]
async fn snapshot_pull_reads_meta_then_all_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/backup/meta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "settings": { "schoolName": "Green Valley" },
            "categories": [],
            "totalStudents": 3,
            "totalChunks": 2,
            "syncedAt": Utc::now(),
            "schemaVersion": 2
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/backup/chunks/0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chunkIndex": 0,
            "students": [{ "id": "s-0" }, { "id": "s-1" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/backup/chunks/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chunkIndex": 1,
            "students": [{ "id": "s-2" }]
        })))
        .mount(&server)
        .await;

    let registry = Arc::new(LayerRegistry::new());
    let adapter = adapter(&server, registry);

    let snapshot = adapter.pull_snapshot().await.unwrap();
    assert_eq!(snapshot.students.len(), 3);
    assert_eq!(snapshot.students[2]["id"], "s-2");
    assert_eq!(snapshot.settings["schoolName"], "Green Valley");
}

#[tokio::test]
async fn snapshot_pull_with_missing_chunk_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/backup/meta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "settings": null,
            "categories": [],
            "totalStudents": 3,
            "totalChunks": 2,
            "syncedAt": Utc::now(),
            "schemaVersion": 2
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/backup/chunks/0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chunkIndex": 0,
            "students": [{ "id": "s-0" }]
        })))
        .mount(&server)
        .await;
    // chunk 1 is missing (404)
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let registry = Arc::new(LayerRegistry::new());
    let adapter = adapter(&server, registry);

    assert!(adapter.pull_snapshot().await.is_none());
}
