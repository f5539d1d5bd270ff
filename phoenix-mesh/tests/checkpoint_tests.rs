use phoenix_mesh::checkpoint::{build_ash_seed, CheckpointDebouncer};
use phoenix_mesh::registry::LayerRegistry;
use phoenix_storage::RecordStore;
use phoenix_types::Record;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

fn store_with_students(count: usize) -> RecordStore {
    let store = RecordStore::open_in_memory().unwrap();
    for i in 0..count {
        store
            .save_record(&Record::new(
                "student",
                Some(format!("s-{i}")),
                json!({ "name": format!("Student {i}") }),
            ))
            .unwrap();
    }
    store
}

// ── Ash seed ────────────────────────────────────────────────────

#[tokio::test]
async fn seed_counts_records_per_type() {
    let store = store_with_students(3);
    store
        .save_record(&Record::new("settings", Some("settings".into()), json!({})))
        .unwrap();

    let registry = LayerRegistry::new();
    let seed = build_ash_seed(&store, registry.availability().await).unwrap();

    assert_eq!(seed.record_counts["student"], 3);
    assert_eq!(seed.record_counts["settings"], 1);
    assert_eq!(seed.total_records(), 4);
}

#[tokio::test]
async fn seed_checksum_tracks_content() {
    let store = store_with_students(2);
    let registry = LayerRegistry::new();

    let before = build_ash_seed(&store, registry.availability().await).unwrap();
    let again = build_ash_seed(&store, registry.availability().await).unwrap();
    assert_eq!(before.checksum, again.checksum);

    store
        .save_record(&Record::new("student", Some("s-9".into()), json!({})))
        .unwrap();
    let after = build_ash_seed(&store, registry.availability().await).unwrap();
    assert_ne!(before.checksum, after.checksum);
}

// ── Debouncer ───────────────────────────────────────────────────

#[tokio::test]
async fn burst_of_mutations_fires_exactly_once() {
    let mut debouncer = CheckpointDebouncer::new(Duration::from_secs(10));
    let start = Instant::now();

    // 10 rapid mutations inside the window
    for i in 0..10u64 {
        debouncer.note_mutation(start + Duration::from_millis(i * 100));
    }

    // Nothing fires before the deadline
    assert!(!debouncer.should_fire(start + Duration::from_secs(5)));

    // Exactly one fire at/after the deadline
    assert!(debouncer.should_fire(start + Duration::from_secs(10)));
    assert!(!debouncer.should_fire(start + Duration::from_secs(11)));
    assert!(!debouncer.is_pending());
}

#[tokio::test]
async fn mutation_after_fire_arms_a_new_window() {
    let mut debouncer = CheckpointDebouncer::new(Duration::from_secs(10));
    let start = Instant::now();

    debouncer.note_mutation(start);
    assert!(debouncer.should_fire(start + Duration::from_secs(10)));

    debouncer.note_mutation(start + Duration::from_secs(20));
    assert!(!debouncer.should_fire(start + Duration::from_secs(25)));
    assert!(debouncer.should_fire(start + Duration::from_secs(30)));
}

#[tokio::test]
async fn idle_debouncer_never_fires() {
    let mut debouncer = CheckpointDebouncer::new(Duration::from_secs(10));
    assert!(!debouncer.should_fire(Instant::now() + Duration::from_secs(60)));
}
