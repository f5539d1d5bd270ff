//! Checkpoint and preference persistence.
//!
//! A single key-value table holds the Ash Seed, the most recent Life-Pod,
//! and the two preference keys the backup UI needs (onboarding flag,
//! reminder snooze). The seed survives everything short of a factory
//! reset.

use crate::error::StorageResult;
use chrono::{DateTime, TimeZone, Utc};
use phoenix_types::{AshSeed, DatasetSnapshot};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const KEY_ASH_SEED: &str = "ash_seed";
const KEY_LIFE_POD: &str = "life_pod";
const KEY_EDUCATION: &str = "backup_education_complete";
const KEY_SNOOZE: &str = "reminder_snooze_until";

/// Key-value meta store backed by SQLite.
#[derive(Clone)]
pub struct MetaStore {
    conn: Arc<Mutex<Connection>>,
}

impl MetaStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let now = Utc::now().timestamp_millis();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO meta (k, v, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row("SELECT v FROM meta WHERE k = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM meta WHERE k = ?1", params![key])?;
        Ok(())
    }

    // ── Ash Seed ────────────────────────────────────────────────

    /// Writes the checkpoint. Idempotent; safe to call from overlapping
    /// backup cycles.
    pub fn save_ash_seed(&self, seed: &AshSeed) -> StorageResult<()> {
        self.put(KEY_ASH_SEED, &serde_json::to_string(seed)?)
    }

    pub fn load_ash_seed(&self) -> StorageResult<Option<AshSeed>> {
        match self.get(KEY_ASH_SEED)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Factory reset only.
    pub fn clear_ash_seed(&self) -> StorageResult<()> {
        self.delete(KEY_ASH_SEED)
    }

    // ── Life-Pod ────────────────────────────────────────────────

    pub fn save_life_pod(&self, pod: &DatasetSnapshot) -> StorageResult<()> {
        self.put(KEY_LIFE_POD, &serde_json::to_string(pod)?)
    }

    pub fn load_life_pod(&self) -> StorageResult<Option<DatasetSnapshot>> {
        match self.get(KEY_LIFE_POD)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    // ── Preferences ─────────────────────────────────────────────

    pub fn set_education_complete(&self, complete: bool) -> StorageResult<()> {
        self.put(KEY_EDUCATION, if complete { "1" } else { "0" })
    }

    pub fn education_complete(&self) -> StorageResult<bool> {
        Ok(self.get(KEY_EDUCATION)?.as_deref() == Some("1"))
    }

    pub fn set_snooze_until(&self, until: DateTime<Utc>) -> StorageResult<()> {
        self.put(KEY_SNOOZE, &until.timestamp_millis().to_string())
    }

    pub fn snooze_until(&self) -> StorageResult<Option<DateTime<Utc>>> {
        match self.get(KEY_SNOOZE)? {
            // Corrupt value reads as "not snoozed"
            Some(raw) => Ok(raw
                .parse::<i64>()
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())),
            None => Ok(None),
        }
    }
}

fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            k TEXT PRIMARY KEY,
            v TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )?;
    Ok(())
}
