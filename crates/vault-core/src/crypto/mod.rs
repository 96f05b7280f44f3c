//! Cryptographic primitives for the secure storage engine
//!
//! This module provides:
//! - AES-256-GCM authenticated encryption of JSON payloads
//! - PBKDF2-HMAC-SHA256 key derivation from passphrases
//! - Secure key memory handling with zeroize

mod cipher;
mod key_derivation;
mod secure_memory;

pub use cipher::{decrypt, encrypt};
pub use key_derivation::{derive_key, generate_salt, PBKDF2_ITERATIONS, SALT_LEN};
pub use secure_memory::MasterKey;
