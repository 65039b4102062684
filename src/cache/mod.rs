//! # Result Caches
//!
//! Append-only, process-lifetime stores for remote computation results. A
//! fingerprint, once present, always maps to the rows of the computation
//! round that produced it. There is no eviction.

pub mod heatmap_cache;
pub mod placeholder;
pub mod result_cache;

pub use heatmap_cache::{HeatmapCache, HeatmapEntry, HeatmapRow, HeatmapTable};
pub use placeholder::{placeholder_count_rows, placeholder_heatmap};
pub use result_cache::{MergeOutcome, ResultCache, ResultRow};

use crate::config::DashboardConfig;

impl ResultCache {
    /// Cache pre-populated with the placeholder rows
    pub fn with_placeholders(config: &DashboardConfig) -> Self {
        let cache = Self::new();
        cache.merge(placeholder_count_rows(config));
        cache
    }
}

impl HeatmapCache {
    /// Cache pre-populated with the synthetic default-region heatmap
    pub fn with_placeholder(config: &DashboardConfig) -> Self {
        let cache = Self::new();
        cache.merge(placeholder_heatmap(config));
        cache
    }
}
