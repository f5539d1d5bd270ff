//! Durable retry queue and dead-letter store.
//!
//! The retry queue holds envelopes that failed to reach the durability
//! bar; one row per `sid`, last write wins. The dead-letter store holds
//! cleartext records that could not be mapped into an envelope at all —
//! the local-only fallback that makes mapping failures loss-free.

use crate::error::StorageResult;
use chrono::Utc;
use phoenix_types::{Envelope, SecureId};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// An envelope waiting for a retry cycle.
#[derive(Debug, Clone)]
pub struct QueuedEnvelope {
    pub sid: SecureId,
    pub envelope: Envelope,
    pub attempts: u32,
    pub queued_at_ms: i64,
}

/// A record preserved in cleartext after a mapping failure.
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    pub key: String,
    pub record_type: String,
    pub payload: serde_json::Value,
    pub reason: String,
    pub created_at_ms: i64,
}

/// Retry-queue + dead-letter store backed by SQLite.
#[derive(Clone)]
pub struct QueueStore {
    conn: Arc<Mutex<Connection>>,
}

impl QueueStore {
    /// Opens or creates a queue store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory queue store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ── Retry queue ─────────────────────────────────────────────

    /// Enqueue an envelope for retry. Idempotent per `sid`: a newer
    /// envelope replaces the queued one and resets its attempt counter.
    pub fn enqueue(&self, envelope: &Envelope) -> StorageResult<()> {
        let envelope_json = serde_json::to_string(envelope)?;
        let now = Utc::now().timestamp_millis();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO retry_queue (sid, envelope_json, queued_at, attempts)
            VALUES (?1, ?2, ?3, 0)
            "#,
            params![envelope.header.sid.as_str(), envelope_json, now],
        )?;
        debug!("queued envelope {} for retry", envelope.header.sid);
        Ok(())
    }

    /// All queued envelopes, oldest first.
    pub fn load_all(&self) -> StorageResult<Vec<QueuedEnvelope>> {
        let rows: Vec<(String, String, i64, i64)> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT sid, envelope_json, queued_at, attempts FROM retry_queue
                 ORDER BY queued_at ASC",
            )?;
            let mapped = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?;
            mapped.collect::<Result<_, _>>()?
        };

        let mut entries = Vec::with_capacity(rows.len());
        for (sid, envelope_json, queued_at, attempts) in rows {
            let envelope: Envelope = serde_json::from_str(&envelope_json)?;
            entries.push(QueuedEnvelope {
                sid: SecureId::from_digest(sid),
                envelope,
                attempts: attempts as u32,
                queued_at_ms: queued_at,
            });
        }
        Ok(entries)
    }

    /// Remove a queue entry after a successful retry.
    pub fn remove(&self, sid: &SecureId) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "DELETE FROM retry_queue WHERE sid = ?1",
            params![sid.as_str()],
        )?;
        Ok(n > 0)
    }

    /// Bump the attempt counter after a failed retry.
    pub fn bump_attempts(&self, sid: &SecureId) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE retry_queue SET attempts = attempts + 1 WHERE sid = ?1",
            params![sid.as_str()],
        )?;
        Ok(())
    }

    pub fn queue_len(&self) -> StorageResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM retry_queue", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Clears the queue. Explicit user action only.
    pub fn clear_queue(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM retry_queue", [])?;
        Ok(())
    }

    // ── Dead letter ─────────────────────────────────────────────

    /// Preserve a record that could not be mapped. Returns the generated
    /// dead-letter key.
    pub fn dead_letter_put(
        &self,
        record_type: &str,
        payload: &serde_json::Value,
        reason: &str,
    ) -> StorageResult<String> {
        let now = Utc::now().timestamp_millis();
        let key = format!("dl_{now}_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let payload_json = serde_json::to_string(payload)?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO dead_letter (key, record_type, payload_json, reason, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![key, record_type, payload_json, reason, now],
        )?;
        Ok(key)
    }

    /// All dead-letter entries, oldest first.
    pub fn dead_letter_all(&self) -> StorageResult<Vec<DeadLetterEntry>> {
        let rows: Vec<(String, String, String, String, i64)> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT key, record_type, payload_json, reason, created_at FROM dead_letter
                 ORDER BY created_at ASC",
            )?;
            let mapped = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?;
            mapped.collect::<Result<_, _>>()?
        };

        let mut entries = Vec::with_capacity(rows.len());
        for (key, record_type, payload_json, reason, created_at) in rows {
            entries.push(DeadLetterEntry {
                key,
                record_type,
                payload: serde_json::from_str(&payload_json)?,
                reason,
                created_at_ms: created_at,
            });
        }
        Ok(entries)
    }

    pub fn dead_letter_len(&self) -> StorageResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM dead_letter", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Remove a dead-letter entry (after successful re-import).
    pub fn dead_letter_remove(&self, key: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM dead_letter WHERE key = ?1", params![key])?;
        Ok(n > 0)
    }
}

fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS retry_queue (
            sid TEXT PRIMARY KEY,
            envelope_json TEXT NOT NULL,
            queued_at INTEGER NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS dead_letter (
            key TEXT PRIMARY KEY,
            record_type TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            reason TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        "#,
    )?;
    Ok(())
}
