//! # vault-core
//!
//! Client-side secure storage engine:
//! - Bounded recency lists with PII stripping and oldest-first eviction
//! - Secure categories with optional AES-256-GCM encryption and TTL expiry
//! - Plain key-value preferences
//! - One SQLite database per engine, versioned schema, per-operation
//!   transactions
//!
//! The [`StorageEngine`] façade owns the database connection and the
//! derived encryption key; operations degrade to safe defaults when the
//! engine is not ready, so callers check boolean/empty results instead of
//! wrapping every call in error handling.

pub mod crypto;
pub mod db;
pub mod engine;
pub mod error;
pub mod prefs;
pub mod recency;
pub mod sanitize;
pub mod secure;

/// JSON payload type for all stored data: string | number | bool | null |
/// array | string-keyed map
pub use serde_json::Value as JsonValue;

pub use crypto::{decrypt, derive_key, encrypt, generate_salt, MasterKey};
pub use engine::{EngineState, StorageEngine, StorageStats};
pub use error::{Result, VaultError};
pub use recency::DEFAULT_MAX_ENTRIES;
pub use secure::SecureRecord;
