//! Error types for vault-core

use thiserror::Error;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Storage engine error types
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Storage engine is not ready - call init first")]
    NotReady,

    #[error("Storage engine is already initialized")]
    AlreadyInitialized,

    #[error("Storage engine failed to initialize and cannot be reused")]
    Failed,

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    #[error("Decryption failed: {0}")]
    DecryptionError(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
