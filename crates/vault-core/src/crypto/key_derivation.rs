//! Passphrase-based key derivation using PBKDF2-HMAC-SHA256

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use super::MasterKey;
use crate::error::{Result, VaultError};

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit master key from a passphrase
///
/// # Arguments
/// * `passphrase` - The user's passphrase (must be non-empty)
/// * `salt` - A salt (use `generate_salt()` to create one)
///
/// # Returns
/// A 32-byte master key suitable for AES-256 encryption
pub fn derive_key(passphrase: &str, salt: &[u8]) -> Result<MasterKey> {
    if passphrase.is_empty() {
        return Err(VaultError::KeyDerivationError(
            "Passphrase must not be empty".to_string(),
        ));
    }
    if salt.is_empty() {
        return Err(VaultError::KeyDerivationError(
            "Salt must not be empty".to_string(),
        ));
    }

    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);

    Ok(MasterKey::new(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_salt() {
        let salt1 = generate_salt();
        let salt2 = generate_salt();

        // Salts should be different
        assert_ne!(salt1, salt2);
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = generate_salt();

        let key1 = derive_key("test-passphrase-123", &salt).unwrap();
        let key2 = derive_key("test-passphrase-123", &salt).unwrap();

        // Same passphrase + salt should produce same key
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_passphrases() {
        let salt = generate_salt();

        let key1 = derive_key("passphrase1", &salt).unwrap();
        let key2 = derive_key("passphrase2", &salt).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salts() {
        let key1 = derive_key("passphrase", &generate_salt()).unwrap();
        let key2 = derive_key("passphrase", &generate_salt()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let salt = generate_salt();
        assert!(derive_key("", &salt).is_err());
    }
}
