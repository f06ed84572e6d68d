//! Content hashing utilities for cache keys and generated table names.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hex characters kept from the digest when naming generated tables.
const TABLE_HASH_LEN: usize = 32;

/// Compute SHA256 hash of a serializable value.
///
/// The value is serialized to JSON before hashing, ensuring deterministic output.
/// Returns a 64-character lowercase hexadecimal string.
///
/// # Errors
/// Returns an error if the value cannot be serialized to JSON.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    Ok(sha256_hex(json.as_bytes()))
}

/// Deterministic SQL-safe table name for a key string.
///
/// Always a valid identifier: `t` followed by 32 lowercase hex characters.
pub fn table_hash(key: &str) -> String {
    let digest = sha256_hex(key.as_bytes());
    format!("t{}", &digest[..TABLE_HASH_LEN])
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
