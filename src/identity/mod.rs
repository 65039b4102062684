//! # Query Identity
//!
//! Value objects describing a query and the fingerprints used as cache keys.

pub mod fingerprint;
pub mod parameters;

pub use fingerprint::{fingerprint, heatmap_fingerprint, Fingerprint};
pub use parameters::{normalize_organisation_ids, FilterSet, HeatmapParameters, QueryParameters};
