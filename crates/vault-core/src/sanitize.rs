//! PII stripping and integrity digests for recency entries
//!
//! Recency entries are sanitized before they ever reach the database,
//! regardless of whether encryption is active. This is a data-minimization
//! control: fields whose names look like account numbers, customer names,
//! or contact details never get persisted.

use sha2::{Digest, Sha256};

use crate::JsonValue;

/// Field names (normalized: lowercase, separators removed) that are
/// stripped from recency entries before storage.
const PII_FIELDS: &[&str] = &[
    "accountnumber",
    "accountno",
    "iban",
    "customername",
    "holdername",
    "fullname",
    "email",
    "emailaddress",
    "phone",
    "phonenumber",
    "mobile",
    "ssn",
    "socialsecuritynumber",
    "cardnumber",
    "pan",
    "cvv",
    "dateofbirth",
    "dob",
    "address",
];

fn is_pii_field(key: &str) -> bool {
    let normalized: String = key
        .chars()
        .filter(|c| *c != '_' && *c != '-' && *c != ' ')
        .collect::<String>()
        .to_lowercase();
    PII_FIELDS.contains(&normalized.as_str())
}

/// Strip PII-shaped fields from an entry, recursing into nested maps
/// and arrays. Scalars pass through unchanged.
pub fn sanitize_entry(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let cleaned = map
                .iter()
                .filter(|(key, _)| !is_pii_field(key))
                .map(|(key, val)| (key.clone(), sanitize_entry(val)))
                .collect();
            JsonValue::Object(cleaned)
        }
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(sanitize_entry).collect())
        }
        other => other.clone(),
    }
}

/// SHA-256 digest of a value's canonical JSON text, hex-encoded.
/// Recorded alongside each recency entry for dedup/audit purposes.
pub fn integrity_hash(value: &JsonValue) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
