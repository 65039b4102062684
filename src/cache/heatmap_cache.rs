//! Correlation heatmap store.
//!
//! Rows are kept in a single append-only log tagged with fingerprint and
//! region. Each fingerprint also records the layout it was produced with, so
//! a lookup can re-select its rows and project them back into a well-formed
//! table.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::identity::Fingerprint;

/// One labelled row of a correlation matrix, values aligned with its columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapRow {
    pub label: String,
    pub values: Vec<f64>,
}

/// A complete heatmap result ready to be merged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapEntry {
    pub fingerprint: Fingerprint,
    pub region: String,
    pub columns: Vec<String>,
    pub rows: Vec<HeatmapRow>,
}

/// Sub-table reconstructed from the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapTable {
    pub region: String,
    pub columns: Vec<String>,
    pub rows: Vec<HeatmapRow>,
}

impl HeatmapTable {
    /// Value at (row label, column), if both exist
    pub fn value(&self, row: &str, column: &str) -> Option<f64> {
        let column_index = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|r| r.label == row)
            .and_then(|r| r.values.get(column_index).copied())
    }
}

#[derive(Debug, Clone)]
struct HeatmapLayout {
    columns: Vec<String>,
    region: String,
}

#[derive(Debug, Clone)]
struct StoredRow {
    fingerprint: Fingerprint,
    region: String,
    label: String,
    values: BTreeMap<String, f64>,
}

#[derive(Debug, Default)]
struct HeatmapState {
    log: Vec<StoredRow>,
    layouts: HashMap<Fingerprint, HeatmapLayout>,
}

#[derive(Debug, Default)]
pub struct HeatmapCache {
    state: RwLock<HeatmapState>,
}

impl HeatmapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruct the table stored under `fingerprint`, or `None` on a miss
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<HeatmapTable> {
        let state = self.state.read();
        let layout = state.layouts.get(fingerprint)?;

        let rows = state
            .log
            .iter()
            .filter(|row| &row.fingerprint == fingerprint && row.region == layout.region)
            .map(|row| HeatmapRow {
                label: row.label.clone(),
                values: layout
                    .columns
                    .iter()
                    .map(|column| row.values.get(column).copied().unwrap_or(f64::NAN))
                    .collect(),
            })
            .collect();

        Some(HeatmapTable {
            region: layout.region.clone(),
            columns: layout.columns.clone(),
            rows,
        })
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.state.read().layouts.contains_key(fingerprint)
    }

    /// Append an entry's rows and record its layout
    ///
    /// Returns `false` without touching the cache when the fingerprint is
    /// already present.
    pub fn merge(&self, entry: HeatmapEntry) -> bool {
        let mut state = self.state.write();
        if state.layouts.contains_key(&entry.fingerprint) {
            warn!(
                fingerprint = %entry.fingerprint.short(),
                "Heatmap already cached, dropping incoming entry"
            );
            return false;
        }

        let row_count = entry.rows.len();
        for row in entry.rows {
            let values = entry
                .columns
                .iter()
                .cloned()
                .zip(row.values)
                .collect::<BTreeMap<_, _>>();
            state.log.push(StoredRow {
                fingerprint: entry.fingerprint.clone(),
                region: entry.region.clone(),
                label: row.label,
                values,
            });
        }
        state.layouts.insert(
            entry.fingerprint.clone(),
            HeatmapLayout {
                columns: entry.columns,
                region: entry.region.clone(),
            },
        );

        debug!(
            fingerprint = %entry.fingerprint.short(),
            region = %entry.region,
            rows = row_count,
            "Merged heatmap into cache"
        );
        true
    }

    /// Number of stored heatmaps
    pub fn len(&self) -> usize {
        self.state.read().layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().layouts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::heatmap_fingerprint;

    fn entry(org_ids: &[i64], region: &str, scale: f64) -> HeatmapEntry {
        HeatmapEntry {
            fingerprint: heatmap_fingerprint(org_ids, region),
            region: region.to_string(),
            columns: vec!["Fmorph.diam".to_string(), "censor".to_string()],
            rows: vec![
                HeatmapRow {
                    label: "Fmorph.diam".to_string(),
                    values: vec![1.0, 0.3 * scale],
                },
                HeatmapRow {
                    label: "censor".to_string(),
                    values: vec![0.3 * scale, 1.0],
                },
            ],
        }
    }

    #[test]
    fn test_lookup_rebuilds_stored_table() {
        let cache = HeatmapCache::new();
        let stored = entry(&[2, 3], "GTV-1", 1.0);
        assert!(cache.merge(stored.clone()));

        let table = cache.lookup(&stored.fingerprint).unwrap();
        assert_eq!(table.region, "GTV-1");
        assert_eq!(table.columns, stored.columns);
        assert_eq!(table.rows, stored.rows);
        assert_eq!(table.value("censor", "Fmorph.diam"), Some(0.3));
    }

    #[test]
    fn test_entries_do_not_leak_between_fingerprints() {
        let cache = HeatmapCache::new();
        let primary = entry(&[2, 3], "GTV-1", 1.0);
        let node = entry(&[2, 3], "GTV-2", 2.0);
        cache.merge(primary.clone());
        cache.merge(node.clone());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(&primary.fingerprint).unwrap().rows.len(), 2);
        assert_eq!(
            cache.lookup(&node.fingerprint).unwrap().value("censor", "Fmorph.diam"),
            Some(0.6)
        );
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = HeatmapCache::new();
        let first = entry(&[2], "GTV-1", 1.0);
        let mut second = entry(&[2], "GTV-1", 2.0);
        second.columns.reverse();

        assert!(cache.merge(first.clone()));
        assert!(!cache.merge(second));
        assert_eq!(cache.lookup(&first.fingerprint).unwrap().columns, first.columns);
    }

    #[test]
    fn test_miss_is_none() {
        let cache = HeatmapCache::new();
        assert!(cache.lookup(&heatmap_fingerprint(&[], "GTV-1")).is_none());
    }
}
