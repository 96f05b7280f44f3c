//! SQLite-backed persistence layer
//!
//! One connection behind a mutex; callers run synchronous rusqlite work
//! through [`Database::with_conn`], so the guard can never be held across
//! an `.await` and the enclosing futures stay `Send`.
//!
//! Code-review rule for this module's callers: every cryptographic
//! operation (encrypt/decrypt/derive) must complete *before* `with_conn`
//! is entered. An open transaction must never wait on crypto.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::debug;

use crate::error::{Result, VaultError};

/// Current schema version, tracked via `PRAGMA user_version`
const SCHEMA_VERSION: i32 = 1;

/// Meta key under which the KDF salt is persisted
pub const META_KDF_SALT: &str = "kdf_salt";

/// Handle to one logical database holding all three partitions
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create, on first run) a database file and bring the
    /// schema up to the current version.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| VaultError::StorageError(format!("Failed to open database: {}", e)))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;

        debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open an in-memory database (tests, ephemeral sessions)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VaultError::StorageError(format!("Failed to open database: {}", e)))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| VaultError::StorageError("Connection mutex poisoned".to_string()))
    }

    /// Execute a synchronous closure with the database connection.
    ///
    /// Because the closure is `FnOnce` (not async), the `MutexGuard` is
    /// guaranteed to drop before any `.await` in the caller.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock_conn()?;
        f(&conn)
    }

    /// Bring the schema up to `SCHEMA_VERSION`. Idempotent: re-running at
    /// the same version is a no-op, and a later version only adds
    /// partitions, never drops existing ones.
    fn migrate(&self) -> Result<()> {
        self.with_conn(|conn| {
            let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

            if version < 1 {
                conn.execute_batch(
                    r#"
                    BEGIN;
                    CREATE TABLE IF NOT EXISTS recent_entries (
                        id          INTEGER PRIMARY KEY AUTOINCREMENT,
                        storage_key TEXT NOT NULL,
                        data        TEXT NOT NULL,
                        timestamp   TEXT NOT NULL,
                        hash        TEXT NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_recent_entries_storage_key
                        ON recent_entries(storage_key);
                    CREATE INDEX IF NOT EXISTS idx_recent_entries_timestamp
                        ON recent_entries(timestamp);

                    CREATE TABLE IF NOT EXISTS user_preferences (
                        key       TEXT PRIMARY KEY,
                        value     TEXT NOT NULL,
                        timestamp TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS secure_data (
                        id         INTEGER PRIMARY KEY AUTOINCREMENT,
                        category   TEXT NOT NULL,
                        data       BLOB NOT NULL,
                        encrypted  INTEGER NOT NULL,
                        timestamp  TEXT NOT NULL,
                        expires_at TEXT
                    );
                    CREATE INDEX IF NOT EXISTS idx_secure_data_category
                        ON secure_data(category);

                    CREATE TABLE IF NOT EXISTS vault_meta (
                        key   TEXT PRIMARY KEY,
                        value BLOB NOT NULL
                    );

                    PRAGMA user_version = 1;
                    COMMIT;
                    "#,
                )?;
                debug!(version = SCHEMA_VERSION, "schema created");
            }

            Ok(())
        })
    }

    /// Read a value from the meta partition
    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>> {
        use rusqlite::OptionalExtension;

        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM vault_meta WHERE key = ?1",
                    [key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    /// Write a value into the meta partition (upsert)
    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO vault_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                rusqlite::params![key, value],
            )?;
            Ok(())
        })
    }

    /// Delete everything from the three data partitions. The meta
    /// partition (and with it the persisted KDF salt) survives.
    pub fn clear_data(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM recent_entries", [])?;
            conn.execute("DELETE FROM user_preferences", [])?;
            conn.execute("DELETE FROM secure_data", [])?;
            Ok(())
        })
    }
}

/// Format a timestamp as fixed-width RFC 3339 so that lexicographic
/// ordering in SQL matches chronological ordering.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp previously written by [`format_timestamp`]
pub(crate) fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| VaultError::StorageError(format!("Invalid timestamp '{}': {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");

        {
            let db = Database::open(&path).unwrap();
            db.put_meta("probe", b"survives").unwrap();
        }

        // Re-opening at the same version must not recreate partitions
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_meta("probe").unwrap(), Some(b"survives".to_vec()));
    }

    #[test]
    fn test_meta_upsert() {
        let db = Database::open_in_memory().unwrap();

        db.put_meta("k", b"v1").unwrap();
        db.put_meta("k", b"v2").unwrap();

        assert_eq!(db.get_meta("k").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(db.get_meta("absent").unwrap(), None);
    }

    #[test]
    fn test_clear_data_keeps_meta() {
        let db = Database::open_in_memory().unwrap();

        db.put_meta(META_KDF_SALT, b"salt-bytes").unwrap();
        db.clear_data().unwrap();

        assert_eq!(
            db.get_meta(META_KDF_SALT).unwrap(),
            Some(b"salt-bytes".to_vec())
        );
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let now = Utc::now();
        let text = format_timestamp(now);
        let parsed = parse_timestamp(&text).unwrap();

        // Micros precision is preserved
        assert_eq!(format_timestamp(parsed), text);
    }
}
