//! Synthetic data shown before login.

use std::collections::BTreeSet;

use crate::config::DashboardConfig;
use crate::constants::PLACEHOLDER_HEATMAP_SIZE;
use crate::identity::{FilterSet, HeatmapParameters, QueryParameters};

use super::{HeatmapEntry, HeatmapRow, ResultRow};

/// Placeholder count rows for the placeholder variable and every variable of
/// the filter table, each under its default identity
///
/// Table variables are seeded under both their predicate and display label,
/// since either names the variable in a query.
pub fn placeholder_count_rows(config: &DashboardConfig) -> Vec<ResultRow> {
    let placeholder = &config.placeholder;
    let variables: BTreeSet<&str> = std::iter::once(placeholder.variable.as_str())
        .chain(
            config
                .variables
                .iter()
                .flat_map(|v| [v.id.as_str(), v.label.as_str()]),
        )
        .collect();

    let mut rows = Vec::new();
    for variable in variables {
        let fingerprint = QueryParameters::new(variable, FilterSet::new(), []).fingerprint();
        rows.extend(
            placeholder
                .counts
                .iter()
                .map(|count| ResultRow::new(count.category.clone(), count.value, fingerprint.clone())),
        );
    }
    rows
}

/// Deterministic symmetric correlation matrix for the default region
pub fn placeholder_heatmap(config: &DashboardConfig) -> HeatmapEntry {
    let region = config.heatmap.default_region.clone();
    let columns: Vec<String> = (0..PLACEHOLDER_HEATMAP_SIZE)
        .map(|i| format!("Column_{i}"))
        .collect();

    let rows = (0..PLACEHOLDER_HEATMAP_SIZE)
        .map(|i| HeatmapRow {
            label: columns[i].clone(),
            values: (0..PLACEHOLDER_HEATMAP_SIZE)
                .map(|j| synthetic_correlation(i, j))
                .collect(),
        })
        .collect();

    HeatmapEntry {
        fingerprint: HeatmapParameters::new(region.as_str(), []).fingerprint(),
        region,
        columns,
        rows,
    }
}

fn synthetic_correlation(i: usize, j: usize) -> f64 {
    if i == j {
        1.0
    } else {
        (((i + j) * 37) % 100) as f64 / 100.0
    }
}
