//! Append-only store of count rows keyed by fingerprint.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;
use tracing::{debug, warn};

use crate::identity::Fingerprint;

/// One (category, value) pair produced by a remote computation round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub category: String,
    pub value: f64,
    pub fingerprint: Fingerprint,
}

impl ResultRow {
    pub fn new(category: impl Into<String>, value: f64, fingerprint: Fingerprint) -> Self {
        Self {
            category: category.into(),
            value,
            fingerprint,
        }
    }
}

/// Outcome of a [`ResultCache::merge`] call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub appended_rows: usize,
    /// Fingerprints that were new to the cache
    pub inserted: Vec<Fingerprint>,
    /// Fingerprints already present; their incoming rows were dropped
    pub skipped: Vec<Fingerprint>,
}

#[derive(Debug, Default)]
struct CacheState {
    rows: Vec<ResultRow>,
    // Each group is appended contiguously, so a range locates it.
    index: HashMap<Fingerprint, Range<usize>>,
}

/// In-memory result cache
///
/// Rows are only ever appended, one contiguous group per fingerprint. A merge
/// takes the write lock once, so lookups never observe a partial group.
#[derive(Debug, Default)]
pub struct ResultCache {
    state: RwLock<CacheState>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows stored under `fingerprint`, or `None` on a miss
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Vec<ResultRow>> {
        let state = self.state.read();
        state
            .index
            .get(fingerprint)
            .map(|range| state.rows[range.clone()].to_vec())
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.state.read().index.contains_key(fingerprint)
    }

    /// Append rows grouped by fingerprint
    ///
    /// Groups whose fingerprint is already cached are skipped whole: rows of
    /// an existing fingerprint are never rewritten or extended.
    pub fn merge(&self, rows: Vec<ResultRow>) -> MergeOutcome {
        let mut groups: Vec<(Fingerprint, Vec<ResultRow>)> = Vec::new();
        let mut positions: HashMap<Fingerprint, usize> = HashMap::new();
        for row in rows {
            match positions.get(&row.fingerprint) {
                Some(&position) => groups[position].1.push(row),
                None => {
                    positions.insert(row.fingerprint.clone(), groups.len());
                    groups.push((row.fingerprint.clone(), vec![row]));
                }
            }
        }

        let mut outcome = MergeOutcome::default();
        let mut state = self.state.write();
        for (fingerprint, group) in groups {
            if state.index.contains_key(&fingerprint) {
                warn!(
                    fingerprint = %fingerprint.short(),
                    rows = group.len(),
                    "Fingerprint already cached, dropping incoming rows"
                );
                outcome.skipped.push(fingerprint);
                continue;
            }

            let start = state.rows.len();
            outcome.appended_rows += group.len();
            state.rows.extend(group);
            let end = state.rows.len();
            state.index.insert(fingerprint.clone(), start..end);
            outcome.inserted.push(fingerprint);
        }
        drop(state);

        debug!(
            appended_rows = outcome.appended_rows,
            inserted = outcome.inserted.len(),
            skipped = outcome.skipped.len(),
            "Merged rows into result cache"
        );
        outcome
    }

    /// Total number of cached rows
    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().rows.is_empty()
    }

    pub fn fingerprint_count(&self) -> usize {
        self.state.read().index.len()
    }
}
