//! User preferences
//!
//! Plain key-value persistence for small non-sensitive settings.
//! Exactly one live value per key; writes are upserts.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::params;

use crate::db::{format_timestamp, Database};
use crate::error::Result;
use crate::JsonValue;

/// Preference operations over one database
pub struct PreferenceStore {
    db: Arc<Database>,
}

impl PreferenceStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Set a preference, overwriting any previous value for the key
    pub fn set(&self, key: &str, value: &JsonValue) -> Result<()> {
        let text = serde_json::to_string(value)?;
        let timestamp = format_timestamp(Utc::now());

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_preferences (key, value, timestamp)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     timestamp = excluded.timestamp",
                params![key, text, timestamp],
            )?;
            Ok(())
        })
    }

    /// Get a preference value, or `None` when absent
    pub fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        use rusqlite::OptionalExtension;

        let text: Option<String> = self.db.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM user_preferences WHERE key = ?1",
                    [key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })?;

        match text {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// Total number of stored preferences
    pub fn count(&self) -> Result<u64> {
        self.db.with_conn(|conn| {
            let count: u64 =
                conn.query_row("SELECT COUNT(*) FROM user_preferences", [], |row| {
                    row.get(0)
                })?;
            Ok(count)
        })
    }
}
