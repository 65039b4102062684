//! # Query Orchestrator
//!
//! Façade used by the UI layer. Every query is fingerprinted and looked up in
//! the cache first; only a miss dispatches a remote computation. Dispatches
//! run on background tasks so a caller dropping its future neither cancels
//! the computation nor leaks registry state, and concurrent callers for the
//! same fingerprint share one dispatch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{HeatmapCache, HeatmapTable, ResultCache, ResultRow};
use crate::config::{DashboardConfig, FilterTable};
use crate::dispatch::{CountQuerySpec, HeatmapQuerySpec, TaskDispatcher};
use crate::error::{DashboardError, DashboardResult};
use crate::identity::{Fingerprint, FilterSet, HeatmapParameters, QueryParameters};

use super::inflight::{wait_for_outcome, InFlightRegistry, Join, Lead};

/// Point-in-time orchestrator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Remote computations started
    pub dispatches: u64,
    pub dispatch_failures: u64,
    /// Callers that joined a dispatch another caller started
    pub shared_waits: u64,
    pub in_flight: usize,
}

#[derive(Debug, Default)]
struct AtomicOrchestratorStats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    dispatches: AtomicU64,
    dispatch_failures: AtomicU64,
    shared_waits: AtomicU64,
}

impl AtomicOrchestratorStats {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Cache-first query resolution with deduplicated remote dispatch
#[derive(Debug, Clone)]
pub struct QueryOrchestrator {
    dispatcher: TaskDispatcher,
    counts: Arc<ResultCache>,
    heatmaps: Arc<HeatmapCache>,
    count_flights: Arc<InFlightRegistry<Vec<ResultRow>>>,
    heatmap_flights: Arc<InFlightRegistry<HeatmapTable>>,
    filter_table: Arc<FilterTable>,
    region_codes: Arc<BTreeSet<String>>,
    placeholder_variable: String,
    default_region: String,
    stats: Arc<AtomicOrchestratorStats>,
}

impl QueryOrchestrator {
    /// Orchestrator with caches seeded from the placeholder dataset
    pub fn new(config: &DashboardConfig, dispatcher: TaskDispatcher) -> Self {
        Self::with_caches(
            config,
            dispatcher,
            Arc::new(ResultCache::with_placeholders(config)),
            Arc::new(HeatmapCache::with_placeholder(config)),
        )
    }

    pub fn with_caches(
        config: &DashboardConfig,
        dispatcher: TaskDispatcher,
        counts: Arc<ResultCache>,
        heatmaps: Arc<HeatmapCache>,
    ) -> Self {
        info!(
            cached_rows = counts.len(),
            cached_heatmaps = heatmaps.len(),
            variables = config.variables.len(),
            "Query orchestrator initialized"
        );
        Self {
            dispatcher,
            counts,
            heatmaps,
            count_flights: Arc::new(InFlightRegistry::new()),
            heatmap_flights: Arc::new(InFlightRegistry::new()),
            filter_table: Arc::new(config.filter_table()),
            region_codes: Arc::new(config.region_codes()),
            placeholder_variable: config.placeholder.variable.clone(),
            default_region: config.heatmap.default_region.clone(),
            stats: Arc::new(AtomicOrchestratorStats::default()),
        }
    }

    /// Rows for `params`, dispatching a remote computation on a cache miss
    pub async fn resolve(&self, params: &QueryParameters) -> DashboardResult<Vec<ResultRow>> {
        let fingerprint = params.fingerprint();
        if let Some(rows) = self.counts.lookup(&fingerprint) {
            AtomicOrchestratorStats::bump(&self.stats.cache_hits);
            debug!(fingerprint = %fingerprint.short(), variable = %params.variable(), "Cache hit");
            return Ok(rows);
        }
        AtomicOrchestratorStats::bump(&self.stats.cache_misses);

        let receiver = match self.count_flights.join(&fingerprint) {
            Join::Follower(receiver) => {
                AtomicOrchestratorStats::bump(&self.stats.shared_waits);
                debug!(fingerprint = %fingerprint.short(), "Joining in-flight count dispatch");
                receiver
            }
            Join::Leader(lead) => {
                // A dispatch may have finished between the lookup and the join.
                if let Some(rows) = self.counts.lookup(&fingerprint) {
                    lead.complete(Ok(rows.clone()));
                    return Ok(rows);
                }
                let receiver = lead.subscribe();
                self.spawn_count_dispatch(lead, CountQuerySpec::from(params), fingerprint.clone());
                receiver
            }
        };

        wait_for_outcome(receiver, &fingerprint)
            .await
            .map_err(DashboardError::from)
    }

    /// Counts for a filter-table variable across the selected organisations
    ///
    /// `variable` is a predicate or a display label. With no organisation
    /// selected, or for the placeholder variable, the placeholder identity
    /// `(variable, {}, [])` is used.
    pub async fn resolve_variable(
        &self,
        variable: &str,
        organisation_ids: &[i64],
    ) -> DashboardResult<Vec<ResultRow>> {
        self.resolve(&self.count_parameters(variable, organisation_ids)?)
            .await
    }

    /// Parameters `resolve_variable` would query with
    pub fn count_parameters(
        &self,
        variable: &str,
        organisation_ids: &[i64],
    ) -> DashboardResult<QueryParameters> {
        if variable == self.placeholder_variable {
            return Ok(QueryParameters::placeholder(variable));
        }

        let predicate = self.filter_table.predicate_for(variable)?;
        if organisation_ids.is_empty() {
            return Ok(QueryParameters::placeholder(variable));
        }

        // Remote nodes only know predicates, so a label is queried by its predicate.
        let categories = self.filter_table.categories_for(predicate)?;
        let filters = FilterSet::from([(predicate.to_string(), categories.clone())]);
        Ok(QueryParameters::new(
            predicate,
            filters,
            organisation_ids.iter().copied(),
        ))
    }

    /// Correlation heatmap for `region` across the selected organisations
    ///
    /// With no organisation selected the default-region placeholder is served.
    pub async fn resolve_heatmap(
        &self,
        region: &str,
        organisation_ids: &[i64],
    ) -> DashboardResult<HeatmapTable> {
        let params = self.heatmap_parameters(region, organisation_ids)?;
        let fingerprint = params.fingerprint();

        if let Some(table) = self.heatmaps.lookup(&fingerprint) {
            AtomicOrchestratorStats::bump(&self.stats.cache_hits);
            debug!(fingerprint = %fingerprint.short(), region = %params.region(), "Heatmap cache hit");
            return Ok(table);
        }
        AtomicOrchestratorStats::bump(&self.stats.cache_misses);

        let receiver = match self.heatmap_flights.join(&fingerprint) {
            Join::Follower(receiver) => {
                AtomicOrchestratorStats::bump(&self.stats.shared_waits);
                receiver
            }
            Join::Leader(lead) => {
                if let Some(table) = self.heatmaps.lookup(&fingerprint) {
                    lead.complete(Ok(table.clone()));
                    return Ok(table);
                }
                let receiver = lead.subscribe();
                self.spawn_heatmap_dispatch(lead, HeatmapQuerySpec::from(&params), fingerprint.clone());
                receiver
            }
        };

        wait_for_outcome(receiver, &fingerprint)
            .await
            .map_err(DashboardError::from)
    }

    /// Parameters `resolve_heatmap` would query with
    pub fn heatmap_parameters(
        &self,
        region: &str,
        organisation_ids: &[i64],
    ) -> DashboardResult<HeatmapParameters> {
        if !self.region_codes.is_empty() && !self.region_codes.contains(region) {
            return Err(DashboardError::unknown_region(region));
        }
        if organisation_ids.is_empty() {
            return Ok(HeatmapParameters::new(self.default_region.as_str(), []));
        }
        Ok(HeatmapParameters::new(region, organisation_ids.iter().copied()))
    }

    /// Cancel the dispatch running for `fingerprint`
    ///
    /// Returns `false` when nothing is in flight for it. Waiters receive a
    /// `Cancelled` error and the cache is left untouched.
    pub fn cancel(&self, fingerprint: &Fingerprint) -> bool {
        let cancelled =
            self.count_flights.cancel(fingerprint) || self.heatmap_flights.cancel(fingerprint);
        if cancelled {
            info!(fingerprint = %fingerprint.short(), "Cancellation requested");
        }
        cancelled
    }

    pub fn is_in_flight(&self, fingerprint: &Fingerprint) -> bool {
        self.count_flights.contains(fingerprint) || self.heatmap_flights.contains(fingerprint)
    }

    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.stats.cache_misses.load(Ordering::Relaxed),
            dispatches: self.stats.dispatches.load(Ordering::Relaxed),
            dispatch_failures: self.stats.dispatch_failures.load(Ordering::Relaxed),
            shared_waits: self.stats.shared_waits.load(Ordering::Relaxed),
            in_flight: self.count_flights.len() + self.heatmap_flights.len(),
        }
    }

    pub fn result_cache(&self) -> &Arc<ResultCache> {
        &self.counts
    }

    pub fn heatmap_cache(&self) -> &Arc<HeatmapCache> {
        &self.heatmaps
    }

    pub fn filter_table(&self) -> &FilterTable {
        &self.filter_table
    }

    fn spawn_count_dispatch(
        &self,
        lead: Lead<Vec<ResultRow>>,
        spec: CountQuerySpec,
        fingerprint: Fingerprint,
    ) {
        AtomicOrchestratorStats::bump(&self.stats.dispatches);
        let dispatcher = self.dispatcher.clone();
        let cache = Arc::clone(&self.counts);
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            let outcome = dispatcher.run_counts(&spec, lead.cancellation()).await;
            let outcome = match outcome {
                Ok(rows) => {
                    let merged = cache.merge(rows);
                    info!(
                        fingerprint = %fingerprint.short(),
                        variable = %spec.variable,
                        appended_rows = merged.appended_rows,
                        "Count results cached"
                    );
                    Ok(cache.lookup(&fingerprint).unwrap_or_default())
                }
                Err(error) => {
                    AtomicOrchestratorStats::bump(&stats.dispatch_failures);
                    warn!(
                        fingerprint = %fingerprint.short(),
                        variable = %spec.variable,
                        error = %error,
                        "Count dispatch failed, cache unchanged"
                    );
                    Err(error)
                }
            };
            lead.complete(outcome);
        });
    }

    fn spawn_heatmap_dispatch(
        &self,
        lead: Lead<HeatmapTable>,
        spec: HeatmapQuerySpec,
        fingerprint: Fingerprint,
    ) {
        AtomicOrchestratorStats::bump(&self.stats.dispatches);
        let dispatcher = self.dispatcher.clone();
        let cache = Arc::clone(&self.heatmaps);
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            let outcome = match dispatcher.run_heatmap(&spec, lead.cancellation()).await {
                Ok(entry) => {
                    let table = HeatmapTable {
                        region: entry.region.clone(),
                        columns: entry.columns.clone(),
                        rows: entry.rows.clone(),
                    };
                    cache.merge(entry);
                    info!(
                        fingerprint = %fingerprint.short(),
                        region = %spec.region,
                        "Heatmap cached"
                    );
                    Ok(cache.lookup(&fingerprint).unwrap_or(table))
                }
                Err(error) => {
                    AtomicOrchestratorStats::bump(&stats.dispatch_failures);
                    warn!(
                        fingerprint = %fingerprint.short(),
                        region = %spec.region,
                        error = %error,
                        "Heatmap dispatch failed, cache unchanged"
                    );
                    Err(error)
                }
            };
            lead.complete(outcome);
        });
    }
}
