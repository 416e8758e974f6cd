//! Deterministic cache keys for search requests.
//!
//! Parameters are ordered by key and their values normalized (lowercase,
//! trimmed, inner whitespace runs collapsed), so two requests that differ
//! only in casing, spacing or parameter order share one cache entry.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;

/// Normalize a value for keying and matching: lowercase, trim, collapse
/// whitespace runs to a single space.
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Canonical `key=value&` concatenation of a parameter set, sorted by key.
pub fn canonical_query<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), normalize(v.as_ref())))
        .collect();

    let mut canonical = String::new();
    for (key, value) in &sorted {
        canonical.push_str(key);
        canonical.push('=');
        canonical.push_str(value);
        canonical.push('&');
    }
    canonical
}

/// Hex-encoded SHA-256 of the canonical query.
pub fn fingerprint<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let canonical = canonical_query(params);
    debug!("Canonical query for cache key: {}", canonical);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
