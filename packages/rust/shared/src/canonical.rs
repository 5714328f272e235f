//! Canonical serialization and content digests.
//!
//! The canonical form is compact JSON with object keys sorted at every depth,
//! so two representations of the same record always hash identically.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Rebuild `value` with every object's keys in lexicographic order.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Canonical JSON text for `value`.
pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

/// SHA-256 over the canonical JSON of `value`.
pub fn digest(value: &Value) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hasher.finalize().into()
}

/// Lowercase hex SHA-256 of the canonical JSON of `value`.
pub fn hex_digest(value: &Value) -> String {
    hex::encode(digest(value))
}
