//! Secure category store
//!
//! Named categories of optionally-encrypted records with optional expiry.
//! Expiry is enforced at read time (no background sweep); decryption
//! failures are per-record and non-fatal - a bad record is skipped, never
//! surfaced as an error for the whole category.
//!
//! Encryption happens strictly before any connection work (see the rule
//! in [`crate::db`]): by the time a transaction opens, the payload bytes
//! are final.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crypto::{self, MasterKey};
use crate::db::{format_timestamp, parse_timestamp, Database};
use crate::error::{Result, VaultError};
use crate::JsonValue;

/// One record in a secure category, as returned by reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureRecord {
    pub category: String,
    /// Decrypted (or plaintext) payload
    pub data: JsonValue,
    /// Whether the record was encrypted at write time
    pub encrypted: bool,
    pub timestamp: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

struct RawRecord {
    data: Vec<u8>,
    encrypted: bool,
    timestamp: String,
    expires_at: Option<String>,
}

/// Secure category operations over one database
pub struct SecureStore {
    db: Arc<Database>,
}

impl SecureStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store one record in a category.
    ///
    /// When a key is active the payload is encrypted before the insert;
    /// the `encrypted` flag records which path was taken at write time
    /// and is never inferred later.
    pub fn store(
        &self,
        category: &str,
        data: &JsonValue,
        ttl_ms: Option<u64>,
        key: Option<&MasterKey>,
    ) -> Result<()> {
        // Crypto first - nothing below may run inside an open transaction
        let (payload, encrypted) = match key {
            Some(key) => (crypto::encrypt(key, data)?, true),
            None => (serde_json::to_vec(data)?, false),
        };

        let now = Utc::now();
        let expires_at = match ttl_ms {
            Some(ms) => {
                // A type-valid TTL can still overflow the timestamp range;
                // reject it instead of panicking in date arithmetic.
                let expiry = i64::try_from(ms)
                    .ok()
                    .and_then(|ms| now.checked_add_signed(TimeDelta::milliseconds(ms)))
                    .ok_or_else(|| {
                        VaultError::StorageError(format!("TTL out of range: {} ms", ms))
                    })?;
                Some(expiry)
            }
            None => None,
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO secure_data (category, data, encrypted, timestamp, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    category,
                    payload,
                    encrypted,
                    format_timestamp(now),
                    expires_at.map(format_timestamp),
                ],
            )?;
            Ok(())
        })
    }

    /// All live records in a category, oldest first.
    ///
    /// Expired records are filtered out; encrypted records that cannot be
    /// decrypted (wrong or missing key, tampering) are logged and skipped.
    pub fn fetch(&self, category: &str, key: Option<&MasterKey>) -> Result<Vec<SecureRecord>> {
        let rows: Vec<RawRecord> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT data, encrypted, timestamp, expires_at FROM secure_data
                 WHERE category = ?1
                 ORDER BY timestamp ASC, id ASC",
            )?;
            let rows = stmt
                .query_map([category], |row| {
                    Ok(RawRecord {
                        data: row.get(0)?,
                        encrypted: row.get(1)?,
                        timestamp: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<RawRecord>, rusqlite::Error>>()?;
            Ok(rows)
        })?;

        // Connection released; decryption happens out here
        let now = Utc::now();
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            let timestamp = match parse_timestamp(&row.timestamp) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(category, error = %e, "skipping record with bad timestamp");
                    continue;
                }
            };

            let expires_at = match row.expires_at.as_deref().map(parse_timestamp) {
                Some(Ok(ts)) => Some(ts),
                Some(Err(e)) => {
                    warn!(category, error = %e, "skipping record with bad expiry");
                    continue;
                }
                None => None,
            };

            if let Some(expiry) = expires_at {
                if expiry <= now {
                    continue;
                }
            }

            let data = if row.encrypted {
                let Some(key) = key else {
                    warn!(category, "skipping encrypted record: no key active");
                    continue;
                };
                match crypto::decrypt(key, &row.data) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(category, error = %e, "skipping undecryptable record");
                        continue;
                    }
                }
            } else {
                match serde_json::from_slice(&row.data) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(category, error = %e, "skipping unparsable record");
                        continue;
                    }
                }
            };

            records.push(SecureRecord {
                category: category.to_string(),
                data,
                encrypted: row.encrypted,
                timestamp,
                expires_at,
            });
        }

        Ok(records)
    }

    /// Total number of secure records across all categories
    pub fn count(&self) -> Result<u64> {
        self.db.with_conn(|conn| {
            let count: u64 =
                conn.query_row("SELECT COUNT(*) FROM secure_data", [], |row| row.get(0))?;
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_key, generate_salt};
    use serde_json::json;

    fn store() -> SecureStore {
        SecureStore::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn test_key() -> MasterKey {
        derive_key("test-passphrase", &generate_salt()).unwrap()
    }

    #[test]
    fn test_plaintext_roundtrip() {
        let store = store();

        store
            .store("session", &json!({"token": "abc"}), None, None)
            .unwrap();

        let records = store.fetch("session", None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, json!({"token": "abc"}));
        assert!(!records[0].encrypted);
        assert!(records[0].expires_at.is_none());
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let store = store();
        let key = test_key();

        store
            .store("pii", &json!({"username": "alice"}), None, Some(&key))
            .unwrap();

        let records = store.fetch("pii", Some(&key)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, json!({"username": "alice"}));
        assert!(records[0].encrypted);
    }

    #[test]
    fn test_wrong_key_records_skipped() {
        let store = store();
        let right = test_key();
        let wrong = test_key();

        store
            .store("pii", &json!({"username": "alice"}), None, Some(&right))
            .unwrap();

        // Wrong key: the record is skipped, not an error
        let records = store.fetch("pii", Some(&wrong)).unwrap();
        assert!(records.is_empty());

        // Missing key: same outcome
        let records = store.fetch("pii", None).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_expired_records_filtered() {
        let store = store();

        store
            .store("session", &json!({"live": false}), Some(0), None)
            .unwrap();
        store
            .store("session", &json!({"live": true}), Some(3_600_000), None)
            .unwrap();

        let records = store.fetch("session", None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, json!({"live": true}));
    }

    #[test]
    fn test_out_of_range_ttl_rejected() {
        let store = store();

        // Past i64::MAX milliseconds
        let result = store.store("session", &json!({"v": 1}), Some(u64::MAX), None);
        assert!(matches!(result, Err(VaultError::StorageError(_))));

        // Fits in i64 but overflows the representable timestamp range
        let result = store.store(
            "session",
            &json!({"v": 1}),
            Some(9_000_000_000_000_000_000),
            None,
        );
        assert!(matches!(result, Err(VaultError::StorageError(_))));

        // Nothing was stored
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_mixed_category() {
        let store = store();
        let key = test_key();

        // Stored before any key was active
        store
            .store("mixed", &json!({"kind": "plain"}), None, None)
            .unwrap();
        // Stored after key activation
        store
            .store("mixed", &json!({"kind": "sealed"}), None, Some(&key))
            .unwrap();

        let records = store.fetch("mixed", Some(&key)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].data, json!({"kind": "plain"}));
        assert!(!records[0].encrypted);
        assert_eq!(records[1].data, json!({"kind": "sealed"}));
        assert!(records[1].encrypted);
    }

    #[test]
    fn test_one_bad_record_does_not_block_category() {
        let store = store();
        let key1 = test_key();
        let key2 = test_key();

        store
            .store("creds", &json!({"owner": "old-session"}), None, Some(&key1))
            .unwrap();
        store
            .store("creds", &json!({"owner": "this-session"}), None, Some(&key2))
            .unwrap();

        let records = store.fetch("creds", Some(&key2)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, json!({"owner": "this-session"}));
    }
}
