//! AES-256-GCM authenticated encryption of JSON payloads
//!
//! Wire format: `nonce || ciphertext` as one opaque byte sequence.
//! - Nonce: 12 bytes (96 bits) - standard for GCM, fresh per call
//! - Ciphertext: variable length, carries the 16-byte auth tag as
//!   emitted by `aes-gcm`

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use super::MasterKey;
use crate::error::{Result, VaultError};
use crate::JsonValue;

/// Nonce length in bytes (96 bits for GCM)
const NONCE_LEN: usize = 12;

/// Encrypt a JSON value using AES-256-GCM
///
/// Serializes the value to JSON text, encrypts it under a fresh random
/// nonce, and returns `nonce || ciphertext` as a single byte sequence.
pub fn encrypt(key: &MasterKey, value: &JsonValue) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

    let plaintext = serde_json::to_vec(value)?;

    // Fresh nonce per call - reuse would break the authentication guarantee
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_slice())
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a `nonce || ciphertext` byte sequence back into a JSON value
///
/// Fails with a decryption error if the key is wrong, the data is
/// corrupted, or the authentication tag does not verify. Callers must
/// treat this as "cannot read this record", not as a fatal error.
pub fn decrypt(key: &MasterKey, bytes: &[u8]) -> Result<JsonValue> {
    if bytes.len() <= NONCE_LEN {
        return Err(VaultError::DecryptionError(format!(
            "Payload too short: {} bytes",
            bytes.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::DecryptionError(e.to_string()))?;

    let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| VaultError::DecryptionError(e.to_string()))?;

    serde_json::from_slice(&plaintext)
        .map_err(|e| VaultError::DecryptionError(format!("Invalid JSON plaintext: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_key, generate_salt};
    use serde_json::json;

    fn test_key() -> MasterKey {
        derive_key("test-passphrase", &generate_salt()).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let value = json!({"username": "alice", "count": 3, "tags": ["a", "b"]});

        let encrypted = encrypt(&key, &value).unwrap();
        let decrypted = decrypt(&key, &encrypted).unwrap();

        assert_eq!(decrypted, value);
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = test_key();
        let value = json!({"same": "plaintext"});

        let encrypted1 = encrypt(&key, &value).unwrap();
        let encrypted2 = encrypt(&key, &value).unwrap();

        // Nonces should differ (random), and so should ciphertexts
        assert_ne!(encrypted1[..12], encrypted2[..12]);
        assert_ne!(encrypted1, encrypted2);
    }

    #[test]
    fn test_wrong_key_fails_decryption() {
        let key1 = test_key();
        let key2 = test_key(); // Different key due to different salt
        let value = json!({"secret": "data"});

        let encrypted = encrypt(&key1, &value).unwrap();
        let result = decrypt(&key2, &encrypted);

        assert!(result.is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails_decryption() {
        let key = test_key();
        let value = json!({"secret": "data"});

        let mut encrypted = encrypt(&key, &value).unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0xFF;

        assert!(decrypt(&key, &encrypted).is_err());
    }

    #[test]
    fn test_truncated_payload_fails_decryption() {
        let key = test_key();
        assert!(decrypt(&key, &[]).is_err());
        assert!(decrypt(&key, &[0u8; 12]).is_err());
    }
}
