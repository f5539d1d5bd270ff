//! Local record store — the dataset Phoenix replicates.
//!
//! When a crypto provider is supplied, `data_json` is stored as base64
//! ciphertext; `id` and `record_type` stay plaintext so lookups and
//! counts work without decryption.

use crate::error::{StorageError, StorageResult};
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use chrono::Utc;
use phoenix_crypto::{CryptoProvider, PassthroughCrypto};
use phoenix_types::Record;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Local dataset store backed by SQLite.
#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
    provider: Arc<dyn CryptoProvider>,
}

impl RecordStore {
    /// Opens or creates a record store at the given path (no encryption).
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            provider: Arc::new(PassthroughCrypto),
        })
    }

    /// Opens an in-memory record store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            provider: Arc::new(PassthroughCrypto),
        })
    }

    /// Opens a record store with a crypto provider for at-rest encryption
    /// of `data_json`.
    pub fn open_with_provider(
        path: &Path,
        provider: Arc<dyn CryptoProvider>,
    ) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            provider,
        })
    }

    fn encrypt_data_json(&self, json_bytes: &[u8]) -> StorageResult<String> {
        if !self.provider.is_available() {
            // Provider not ready — store plaintext (pre-unlock state)
            return Ok(String::from_utf8_lossy(json_bytes).into_owned());
        }
        let ciphertext = self
            .provider
            .encrypt_bytes(json_bytes)
            .map_err(|e| StorageError::Encryption(e.to_string()))?;
        Ok(B64.encode(ciphertext))
    }

    /// Handles both encrypted (base64) and legacy plaintext rows
    /// transparently.
    fn decrypt_data_json(&self, raw: &str) -> StorageResult<serde_json::Value> {
        if let Ok(val) = serde_json::from_str::<serde_json::Value>(raw) {
            return Ok(val);
        }
        let ciphertext = B64
            .decode(raw)
            .map_err(|e| StorageError::Encryption(format!("base64 decode: {e}")))?;
        let plaintext = self
            .provider
            .decrypt_bytes(&ciphertext)
            .map_err(|e| StorageError::Encryption(e.to_string()))?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Save (upsert) a record. The record must carry an id — the mapper
    /// assigns surrogates before anything reaches this store.
    pub fn save_record(&self, record: &Record) -> StorageResult<()> {
        let id = record
            .id
            .as_deref()
            .ok_or_else(|| StorageError::MissingId(record.record_type.clone()))?;

        let json_bytes = serde_json::to_vec(&record.data)?;
        let data_json = self.encrypt_data_json(&json_bytes)?;
        let now = Utc::now().timestamp_millis();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO records (id, record_type, data_json, created_at, modified_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(id) DO UPDATE SET
                record_type = excluded.record_type,
                data_json = excluded.data_json,
                modified_at = excluded.modified_at
            "#,
            params![id, record.record_type, data_json, now],
        )?;
        Ok(())
    }

    /// Get a single record by id.
    pub fn get_record(&self, id: &str) -> StorageResult<Option<Record>> {
        let row = {
            let conn = self.conn.lock().unwrap();
            conn.query_row(
                "SELECT id, record_type, data_json FROM records WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?
        };

        match row {
            Some((id, record_type, data_json)) => {
                let data = self.decrypt_data_json(&data_json)?;
                Ok(Some(Record::new(record_type, Some(id), data)))
            }
            None => Ok(None),
        }
    }

    /// List records of a given type, ordered by modification time.
    pub fn list_records(&self, record_type: &str) -> StorageResult<Vec<Record>> {
        let rows: Vec<(String, String, String)> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, record_type, data_json FROM records
                 WHERE record_type = ?1 ORDER BY modified_at ASC, id ASC",
            )?;
            let mapped = stmt.query_map(params![record_type], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            mapped.collect::<Result<_, _>>()?
        };

        let mut records = Vec::with_capacity(rows.len());
        for (id, record_type, data_json) in rows {
            let data = self.decrypt_data_json(&data_json)?;
            records.push(Record::new(record_type, Some(id), data));
        }
        Ok(records)
    }

    /// Record counts per logical type.
    pub fn count_by_type(&self) -> StorageResult<BTreeMap<String, u64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT record_type, COUNT(*) FROM records GROUP BY record_type")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (record_type, count) = row?;
            counts.insert(record_type, count as u64);
        }
        Ok(counts)
    }

    pub fn count_records(&self) -> StorageResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.count_records()? == 0)
    }

    /// Checksum material: (id, modified_at) pairs in stable order.
    pub fn fingerprint_rows(&self) -> StorageResult<Vec<(String, i64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, modified_at FROM records ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn delete_record(&self, id: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM records WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    /// Factory reset. Drops every record.
    pub fn clear_all(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM records", [])?;
        Ok(())
    }
}

fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            record_type TEXT NOT NULL,
            data_json TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            modified_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_records_type ON records(record_type);
        "#,
    )?;
    Ok(())
}
