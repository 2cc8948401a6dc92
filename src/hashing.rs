//! Hashing System - SHA-256 Catalog Revisions
//!
//! A revision identifies the configuration state a lab was read in, so the
//! persistence layer can detect an edit made against a stale snapshot.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::lab::{Lab, LabOffering};
use crate::toggles::FeatureToggleSet;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    let sorted = sort_value(&v);
    to_string(&sorted)
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

#[derive(Serialize)]
struct CatalogState<'a> {
    lab: &'a Uuid,
    toggles: &'a FeatureToggleSet,
    offerings: &'a [LabOffering],
}

/// Revision of a lab's toggles and offerings.
///
/// Name, owner and creation time do not contribute.
pub fn catalog_revision(lab: &Lab) -> Result<String, serde_json::Error> {
    let state = CatalogState {
        lab: &lab.id,
        toggles: &lab.toggles,
        offerings: &lab.offerings,
    };
    let canonical = canonical_json(&state)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
