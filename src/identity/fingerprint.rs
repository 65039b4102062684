//! Deterministic query fingerprints.
//!
//! A fingerprint is the lowercase hex SHA-256 digest of a canonical JSON
//! rendering of the query's identity. `serde_json::Value` objects keep their
//! keys sorted, filter codes are held in ordered sets and organisation ids are
//! sorted before hashing, so the rendering is stable across input order.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fmt;

use super::parameters::{normalize_organisation_ids, FilterSet};

/// Cache key identifying one query's semantic parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fingerprint of a count query
pub fn fingerprint(variable: &str, filters: &FilterSet, organisation_ids: &[i64]) -> Fingerprint {
    let organisation_ids = normalize_organisation_ids(organisation_ids.iter().copied());
    digest(&json!({
        "kind": "counts",
        "variable": variable,
        "filters": filters,
        "organisation_ids": organisation_ids,
    }))
}

/// Fingerprint of a correlation heatmap query
pub fn heatmap_fingerprint(organisation_ids: &[i64], region: &str) -> Fingerprint {
    let organisation_ids = normalize_organisation_ids(organisation_ids.iter().copied());
    digest(&json!({
        "kind": "heatmap",
        "organisation_ids": organisation_ids,
        "region": region,
    }))
}

fn digest(components: &serde_json::Value) -> Fingerprint {
    let canonical = components.to_string();
    let hash = Sha256::digest(canonical.as_bytes());
    Fingerprint(format!("{hash:x}"))
}
