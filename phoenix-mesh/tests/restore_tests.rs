mod support;

use chrono::Utc;
use phoenix_mesh::checkpoint::build_ash_seed;
use phoenix_mesh::registry::LayerRegistry;
use phoenix_mesh::types::{RestoreSource, StatusBoard, SyncPhase};
use phoenix_mesh::RestoreCoordinator;
use phoenix_storage::{MetaStore, RecordStore};
use phoenix_types::{DatasetSnapshot, LayerKind, Record};
use serde_json::json;
use std::sync::Arc;
use support::MockAdapter;

fn snapshot_with_students(count: usize) -> DatasetSnapshot {
    let mut snapshot = DatasetSnapshot::empty(Utc::now());
    snapshot.students = (0..count)
        .map(|i| json!({ "id": format!("s-{i}"), "name": format!("Student {i}") }))
        .collect();
    snapshot
}

struct Fixture {
    coordinator: RestoreCoordinator,
    drive: Arc<MockAdapter>,
    document: Arc<MockAdapter>,
    registry: Arc<LayerRegistry>,
    records: RecordStore,
    meta: MetaStore,
    status: StatusBoard,
}

fn fixture() -> Fixture {
    let registry = Arc::new(LayerRegistry::new());
    let drive = MockAdapter::accepting(LayerKind::Drive, registry.clone());
    let document = MockAdapter::accepting(LayerKind::Document, registry.clone());
    let records = RecordStore::open_in_memory().unwrap();
    let meta = MetaStore::open_in_memory().unwrap();
    let status = StatusBoard::new();

    let coordinator = RestoreCoordinator::new(
        vec![
            (RestoreSource::Drive, support::as_dyn(&drive)),
            (RestoreSource::Document, support::as_dyn(&document)),
        ],
        registry.clone(),
        records.clone(),
        meta.clone(),
        status.clone(),
    );

    Fixture {
        coordinator,
        drive,
        document,
        registry,
        records,
        meta,
        status,
    }
}

// ── Priority chain ──────────────────────────────────────────────

#[tokio::test]
async fn full_fidelity_drive_wins_over_document_fallback() {
    let f = fixture();
    f.drive.set_snapshot(snapshot_with_students(7));
    f.document.set_snapshot(snapshot_with_students(4));

    let report = f.coordinator.restore().await;

    // Never falls through to the fallback once a source produced data
    assert_eq!(report.source, Some(RestoreSource::Drive));
    assert_eq!(report.record_count, 7);
    assert_eq!(f.records.count_records().unwrap(), 7);
}

#[tokio::test]
async fn document_fallback_used_when_drive_is_empty() {
    let f = fixture();
    f.document.set_snapshot(snapshot_with_students(4));

    let report = f.coordinator.restore().await;
    assert_eq!(report.source, Some(RestoreSource::Document));
    assert_eq!(report.record_count, 4);
}

#[tokio::test]
async fn session_disabled_drive_is_skipped() {
    let f = fixture();
    f.drive.set_snapshot(snapshot_with_students(7));
    f.document.set_snapshot(snapshot_with_students(4));
    f.registry
        .disable_for_session(LayerKind::Drive, "session invalid")
        .await;

    let report = f.coordinator.restore().await;
    assert_eq!(report.source, Some(RestoreSource::Document));
    assert_eq!(report.record_count, 4);
}

#[tokio::test]
async fn life_pod_is_the_last_resort() {
    let f = fixture();
    f.meta.save_life_pod(&snapshot_with_students(3)).unwrap();

    let report = f.coordinator.restore().await;
    assert_eq!(report.source, Some(RestoreSource::LocalPod));
    assert_eq!(report.record_count, 3);
}

#[tokio::test]
async fn nothing_anywhere_is_a_normal_terminal_state() {
    let f = fixture();

    let report = f.coordinator.restore().await;
    assert_eq!(report.source, None);
    assert_eq!(report.record_count, 0);
    // A brand-new installation is not an error
    assert_eq!(f.status.snapshot().phase, SyncPhase::Idle);
}

#[tokio::test]
async fn seed_claiming_data_turns_empty_restore_into_a_warning() {
    let f = fixture();
    f.records
        .save_record(&Record::new("student", Some("s-1".into()), json!({})))
        .unwrap();
    let seed = build_ash_seed(&f.records, f.registry.availability().await).unwrap();
    f.meta.save_ash_seed(&seed).unwrap();
    f.records.clear_all().unwrap();

    let report = f.coordinator.restore().await;
    assert_eq!(report.source, None);
    assert_eq!(f.status.snapshot().phase, SyncPhase::Warning);
}

// ── Guards & side effects ───────────────────────────────────────

#[tokio::test]
async fn non_empty_local_store_short_circuits() {
    let f = fixture();
    f.records
        .save_record(&Record::new("student", Some("s-1".into()), json!({})))
        .unwrap();
    f.drive.set_snapshot(snapshot_with_students(7));

    let report = f.coordinator.restore().await;
    assert_eq!(report.source, None);
    assert_eq!(report.record_count, 1);
    // The existing dataset was not overwritten
    assert_eq!(f.records.count_records().unwrap(), 1);
}

#[tokio::test]
async fn successful_restore_regenerates_the_ash_seed() {
    let f = fixture();
    f.drive.set_snapshot(snapshot_with_students(7));
    assert!(f.meta.load_ash_seed().unwrap().is_none());

    f.coordinator.restore().await;

    let seed = f.meta.load_ash_seed().unwrap().unwrap();
    assert_eq!(seed.record_counts["student"], 7);
}

#[tokio::test]
async fn restored_records_are_readable_locally() {
    let f = fixture();
    f.drive.set_snapshot(snapshot_with_students(2));

    f.coordinator.restore().await;

    let student = f.records.get_record("s-1").unwrap().unwrap();
    assert_eq!(student.data["name"], "Student 1");
}
