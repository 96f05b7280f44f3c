//! Bounded recency lists
//!
//! Per logical `storage_key`, an ordered list of recent entries with
//! oldest-first eviction. Entries are sanitized (PII stripped) before
//! they are written; eviction runs after every insert so the bound
//! holds continuously, not just at read time.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::params;

use crate::db::{format_timestamp, Database};
use crate::error::Result;
use crate::sanitize::{integrity_hash, sanitize_entry};
use crate::JsonValue;

/// Default bound on the number of entries kept per storage key
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Recency list operations over one database
pub struct RecencyStore {
    db: Arc<Database>,
}

impl RecencyStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Sanitize and insert an entry, then evict the oldest entries
    /// beyond `max_entries` for the same storage key.
    pub fn add(&self, storage_key: &str, entry: &JsonValue, max_entries: usize) -> Result<()> {
        let sanitized = sanitize_entry(entry);
        let hash = integrity_hash(&sanitized);
        let data = serde_json::to_string(&sanitized)?;
        let timestamp = format_timestamp(Utc::now());

        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            tx.execute(
                "INSERT INTO recent_entries (storage_key, data, timestamp, hash)
                 VALUES (?1, ?2, ?3, ?4)",
                params![storage_key, data, timestamp, hash],
            )?;

            // Keep the newest max_entries rows, delete everything older.
            // Eviction observes the row inserted above.
            tx.execute(
                "DELETE FROM recent_entries WHERE id IN (
                     SELECT id FROM recent_entries
                     WHERE storage_key = ?1
                     ORDER BY timestamp DESC, id DESC
                     LIMIT -1 OFFSET ?2
                 )",
                params![storage_key, max_entries as i64],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    /// All entries for a storage key, most recent first, data portion only
    pub fn list(&self, storage_key: &str) -> Result<Vec<JsonValue>> {
        let rows: Vec<String> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT data FROM recent_entries
                 WHERE storage_key = ?1
                 ORDER BY timestamp DESC, id DESC",
            )?;
            let rows = stmt
                .query_map([storage_key], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, rusqlite::Error>>()?;
            Ok(rows)
        })?;

        rows.iter()
            .map(|data| serde_json::from_str(data).map_err(Into::into))
            .collect()
    }

    /// Remove every entry for a storage key
    pub fn clear(&self, storage_key: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM recent_entries WHERE storage_key = ?1",
                [storage_key],
            )?;
            Ok(())
        })
    }

    /// Total number of recency entries across all storage keys
    pub fn count(&self) -> Result<u64> {
        self.db.with_conn(|conn| {
            let count: u64 =
                conn.query_row("SELECT COUNT(*) FROM recent_entries", [], |row| row.get(0))?;
            Ok(count)
        })
    }
}
