//! Deterministic cache key generation.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::Error;

/// Compute a cache key from a namespace and request parameters.
///
/// Parameters go through `serde_json::Value`, whose object maps are ordered by
/// key, so two logically identical requests always hash the same regardless of
/// field declaration order.
pub fn compute_cache_key<T: Serialize>(namespace: &str, params: &T) -> Result<String, Error> {
    let canonical = serde_json::to_value(params)?.to_string();

    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
