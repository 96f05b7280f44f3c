//! Storage engine façade
//!
//! Owns the database connection and the derived encryption key, and
//! exposes recency, secure-category, and preference operations as one
//! cohesive API. Public methods degrade to safe defaults (`false`, empty
//! results) when the engine is not ready; the `try_*` counterparts return
//! the typed error for callers and tests that want the richer signal.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::crypto::{derive_key, generate_salt, MasterKey};
use crate::db::{Database, META_KDF_SALT};
use crate::error::{Result, VaultError};
use crate::prefs::PreferenceStore;
use crate::recency::{RecencyStore, DEFAULT_MAX_ENTRIES};
use crate::secure::{SecureRecord, SecureStore};
use crate::JsonValue;

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, init not yet called
    Uninitialized,
    /// init in progress
    Initializing,
    /// Open and usable
    Ready,
    /// init failed; terminal for this instance
    Failed,
}

/// Row counts per partition, as reported by [`StorageEngine::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub recent_entries: u64,
    pub user_preferences: u64,
    pub secure_data: u64,
}

/// Where the engine keeps its database
enum Location {
    Path(PathBuf),
    Memory,
}

/// Client-side secure storage engine
///
/// Constructed per logical database; owns its connection and derived key
/// exclusively for its lifetime. The key lives only in memory and is
/// never persisted.
pub struct StorageEngine {
    location: Location,
    db: Option<Arc<Database>>,
    master_key: Option<MasterKey>,
    state: EngineState,
}

impl StorageEngine {
    /// Create an engine backed by a database file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::Path(path.into()),
            db: None,
            master_key: None,
            state: EngineState::Uninitialized,
        }
    }

    /// Create an engine backed by an in-memory database
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            db: None,
            master_key: None,
            state: EngineState::Uninitialized,
        }
    }

    /// Get the current engine state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Check if the engine is ready for operations
    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Ready
    }

    /// Initialize the engine, optionally with a passphrase.
    ///
    /// Opens (or creates) the database and, when a passphrase is given,
    /// derives the encryption key from it and the persisted salt. Without
    /// a passphrase the engine runs in unencrypted mode. Returns whether
    /// the engine became ready; a failed init is terminal for this
    /// instance.
    pub async fn init(&mut self, passphrase: Option<&str>) -> bool {
        match self.try_init(passphrase).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "storage engine initialization failed");
                false
            }
        }
    }

    /// Typed variant of [`init`](Self::init)
    pub async fn try_init(&mut self, passphrase: Option<&str>) -> Result<()> {
        match self.state {
            EngineState::Uninitialized => {}
            EngineState::Ready | EngineState::Initializing => {
                return Err(VaultError::AlreadyInitialized)
            }
            EngineState::Failed => return Err(VaultError::Failed),
        }

        self.state = EngineState::Initializing;

        match self.open_and_derive(passphrase).await {
            Ok(()) => {
                self.state = EngineState::Ready;
                info!(
                    encrypted = self.master_key.is_some(),
                    "storage engine ready"
                );
                Ok(())
            }
            Err(e) => {
                self.state = EngineState::Failed;
                self.db = None;
                self.master_key = None;
                Err(e)
            }
        }
    }

    async fn open_and_derive(&mut self, passphrase: Option<&str>) -> Result<()> {
        let db = match &self.location {
            Location::Path(path) => Database::open(path)?,
            Location::Memory => Database::open_in_memory()?,
        };

        if let Some(passphrase) = passphrase {
            // The salt lives in the meta partition so that a later engine
            // on the same database derives the same key from the same
            // passphrase.
            let salt = match db.get_meta(META_KDF_SALT)? {
                Some(salt) => salt,
                None => {
                    let salt = generate_salt();
                    db.put_meta(META_KDF_SALT, &salt)?;
                    salt.to_vec()
                }
            };

            // Key derivation is CPU-bound; run it off the async executor
            let passphrase = passphrase.to_string();
            let key = tokio::task::spawn_blocking(move || derive_key(&passphrase, &salt))
                .await
                .map_err(|e| VaultError::KeyDerivationError(e.to_string()))??;
            self.master_key = Some(key);
        }

        self.db = Some(Arc::new(db));
        Ok(())
    }

    fn ready_db(&self) -> Result<Arc<Database>> {
        if self.state != EngineState::Ready {
            return Err(VaultError::NotReady);
        }
        self.db.clone().ok_or(VaultError::NotReady)
    }

    fn degrade<T>(result: Result<T>, default: T, operation: &str) -> T {
        match result {
            Ok(value) => value,
            Err(VaultError::NotReady) => {
                debug!(operation, "storage engine not ready");
                default
            }
            Err(e) => {
                warn!(operation, error = %e, "storage operation failed");
                default
            }
        }
    }

    // --- Recency list API ---

    /// Add an entry to a bounded recency list. PII-shaped fields are
    /// stripped before storage; the oldest entries beyond `max_entries`
    /// (default 50) are evicted.
    pub async fn add_recent_entry(
        &self,
        storage_key: &str,
        entry: &JsonValue,
        max_entries: Option<usize>,
    ) -> bool {
        Self::degrade(
            self.try_add_recent_entry(storage_key, entry, max_entries)
                .await
                .map(|_| true),
            false,
            "add_recent_entry",
        )
    }

    /// Typed variant of [`add_recent_entry`](Self::add_recent_entry)
    pub async fn try_add_recent_entry(
        &self,
        storage_key: &str,
        entry: &JsonValue,
        max_entries: Option<usize>,
    ) -> Result<()> {
        let db = self.ready_db()?;
        RecencyStore::new(db).add(
            storage_key,
            entry,
            max_entries.unwrap_or(DEFAULT_MAX_ENTRIES),
        )
    }

    /// All entries in a recency list, most recent first
    pub async fn get_recent_entries(&self, storage_key: &str) -> Vec<JsonValue> {
        Self::degrade(
            self.try_get_recent_entries(storage_key).await,
            Vec::new(),
            "get_recent_entries",
        )
    }

    /// Typed variant of [`get_recent_entries`](Self::get_recent_entries)
    pub async fn try_get_recent_entries(&self, storage_key: &str) -> Result<Vec<JsonValue>> {
        let db = self.ready_db()?;
        RecencyStore::new(db).list(storage_key)
    }

    /// Remove every entry in a recency list
    pub async fn clear_recent_list(&self, storage_key: &str) -> bool {
        Self::degrade(
            self.try_clear_recent_list(storage_key).await.map(|_| true),
            false,
            "clear_recent_list",
        )
    }

    /// Typed variant of [`clear_recent_list`](Self::clear_recent_list)
    pub async fn try_clear_recent_list(&self, storage_key: &str) -> Result<()> {
        let db = self.ready_db()?;
        RecencyStore::new(db).clear(storage_key)
    }

    // --- Secure category API ---

    /// Store a record in a secure category, encrypted when a key is
    /// active, expiring after `ttl_ms` when given.
    pub async fn store_secure_data(
        &self,
        category: &str,
        data: &JsonValue,
        ttl_ms: Option<u64>,
    ) -> bool {
        Self::degrade(
            self.try_store_secure_data(category, data, ttl_ms)
                .await
                .map(|_| true),
            false,
            "store_secure_data",
        )
    }

    /// Typed variant of [`store_secure_data`](Self::store_secure_data)
    pub async fn try_store_secure_data(
        &self,
        category: &str,
        data: &JsonValue,
        ttl_ms: Option<u64>,
    ) -> Result<()> {
        let db = self.ready_db()?;
        SecureStore::new(db).store(category, data, ttl_ms, self.master_key.as_ref())
    }

    /// All live records in a secure category; expired and undecryptable
    /// records are omitted.
    pub async fn get_secure_data(&self, category: &str) -> Vec<SecureRecord> {
        Self::degrade(
            self.try_get_secure_data(category).await,
            Vec::new(),
            "get_secure_data",
        )
    }

    /// Typed variant of [`get_secure_data`](Self::get_secure_data)
    pub async fn try_get_secure_data(&self, category: &str) -> Result<Vec<SecureRecord>> {
        let db = self.ready_db()?;
        SecureStore::new(db).fetch(category, self.master_key.as_ref())
    }

    // --- Preference API ---

    /// Set a preference value (upsert)
    pub async fn set_preference(&self, key: &str, value: &JsonValue) -> bool {
        Self::degrade(
            self.try_set_preference(key, value).await.map(|_| true),
            false,
            "set_preference",
        )
    }

    /// Typed variant of [`set_preference`](Self::set_preference)
    pub async fn try_set_preference(&self, key: &str, value: &JsonValue) -> Result<()> {
        let db = self.ready_db()?;
        PreferenceStore::new(db).set(key, value)
    }

    /// Get a preference value, or `default` when absent (or the engine
    /// is not ready)
    pub async fn get_preference(&self, key: &str, default: JsonValue) -> JsonValue {
        match self.try_get_preference(key).await {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(VaultError::NotReady) => {
                debug!(operation = "get_preference", "storage engine not ready");
                default
            }
            Err(e) => {
                warn!(operation = "get_preference", error = %e, "storage operation failed");
                default
            }
        }
    }

    /// Typed variant of [`get_preference`](Self::get_preference)
    pub async fn try_get_preference(&self, key: &str) -> Result<Option<JsonValue>> {
        let db = self.ready_db()?;
        PreferenceStore::new(db).get(key)
    }

    // --- Maintenance API ---

    /// Delete everything from all three data partitions
    pub async fn clear_all(&self) -> bool {
        Self::degrade(
            self.try_clear_all().await.map(|_| true),
            false,
            "clear_all",
        )
    }

    /// Typed variant of [`clear_all`](Self::clear_all)
    pub async fn try_clear_all(&self) -> Result<()> {
        let db = self.ready_db()?;
        db.clear_data()
    }

    /// Row counts per partition
    pub async fn stats(&self) -> StorageStats {
        Self::degrade(self.try_stats().await, StorageStats::default(), "stats")
    }

    /// Typed variant of [`stats`](Self::stats)
    pub async fn try_stats(&self) -> Result<StorageStats> {
        let db = self.ready_db()?;
        Ok(StorageStats {
            recent_entries: RecencyStore::new(db.clone()).count()?,
            user_preferences: PreferenceStore::new(db.clone()).count()?,
            secure_data: SecureStore::new(db).count()?,
        })
    }
}
