//! # Dashboard Configuration
//!
//! Typed configuration for the dashboard core. Every section has built-in
//! defaults matching the deployed dashboard, so an empty configuration
//! directory yields a working setup.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use federated_dashboard::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let interval = manager.config().polling.interval();
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;
use crate::error::{DashboardError, DashboardResult};

pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Where and how remote tasks are routed
    pub routing: RoutingConfig,

    /// Poll loop timing
    pub polling: PollingConfig,

    /// Diagnostic result artifacts
    pub persistence: PersistenceConfig,

    /// Filter table: one entry per queryable variable
    pub variables: Vec<VariableConfig>,

    /// Regions of interest offered for the heatmap
    pub regions: Vec<RegionConfig>,

    /// Correlation heatmap task settings
    pub heatmap: HeatmapConfig,

    /// Dataset shown before login
    pub placeholder: PlaceholderConfig,
}

/// Routing metadata attached to every remote task
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub collaboration_id: i64,
    /// Organisation(s) that run the aggregating part of the algorithm
    pub aggregating_organisation_ids: Vec<i64>,
    pub count_image: String,
    pub heatmap_image: String,
    pub data_format: String,
    /// Datasource kind on the nodes
    pub database: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            collaboration_id: constants::routing::COLLABORATION_ID,
            aggregating_organisation_ids: vec![constants::routing::AGGREGATING_ORGANISATION_ID],
            count_image: constants::routing::COUNT_IMAGE.to_string(),
            heatmap_image: constants::routing::HEATMAP_IMAGE.to_string(),
            data_format: constants::routing::DATA_FORMAT.to_string(),
            database: constants::routing::DATABASE.to_string(),
        }
    }
}

/// Poll loop timing
///
/// A multiplier of 1.0 keeps the interval fixed; larger values grow the
/// interval after every incomplete poll up to `max_interval_ms`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_interval_ms: u64,
    pub backoff_multiplier: f64,
    pub timeout_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: constants::polling::INTERVAL_MS,
            max_interval_ms: constants::polling::MAX_INTERVAL_MS,
            backoff_multiplier: constants::polling::BACKOFF_MULTIPLIER,
            timeout_seconds: constants::polling::TIMEOUT_SECONDS,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: PathBuf::from("output"),
        }
    }
}

/// One row of the filter table
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VariableConfig {
    /// Predicate queried on the nodes, e.g. `roo:P100018`
    pub id: String,
    pub label: String,
    /// Category codes a query for this variable is restricted to
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RegionConfig {
    pub label: String,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub explanatory_variables: Vec<String>,
    pub censor_column: String,
    pub default_region: String,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            explanatory_variables: constants::heatmap::EXPLANATORY_VARIABLES
                .iter()
                .map(|v| v.to_string())
                .collect(),
            censor_column: constants::heatmap::CENSOR_COLUMN.to_string(),
            default_region: constants::DEFAULT_REGION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaceholderCount {
    pub category: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaceholderConfig {
    pub variable: String,
    pub counts: Vec<PlaceholderCount>,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            variable: constants::PLACEHOLDER_VARIABLE.to_string(),
            counts: constants::PLACEHOLDER_COUNTS
                .iter()
                .map(|(category, value)| PlaceholderCount {
                    category: category.to_string(),
                    value: *value,
                })
                .collect(),
        }
    }
}

pub fn default_variables() -> Vec<VariableConfig> {
    constants::DEFAULT_VARIABLES
        .iter()
        .map(|(id, label, categories)| VariableConfig {
            id: id.to_string(),
            label: label.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        })
        .collect()
}

pub fn default_regions() -> Vec<RegionConfig> {
    constants::DEFAULT_REGIONS
        .iter()
        .map(|(label, code)| RegionConfig {
            label: label.to_string(),
            code: code.to_string(),
        })
        .collect()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            routing: RoutingConfig::default(),
            polling: PollingConfig::default(),
            persistence: PersistenceConfig::default(),
            variables: default_variables(),
            regions: default_regions(),
            heatmap: HeatmapConfig::default(),
            placeholder: PlaceholderConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Filter table keyed by variable id
    pub fn filter_table(&self) -> FilterTable {
        FilterTable::from_variables(&self.variables)
    }

    pub fn region_codes(&self) -> BTreeSet<String> {
        self.regions.iter().map(|r| r.code.clone()).collect()
    }

    /// Validate configuration values
    pub fn validate(&self) -> DashboardResult<()> {
        let polling = &self.polling;
        if polling.interval_ms == 0 {
            return Err(config_error("polling.interval_ms must be greater than 0"));
        }
        if polling.max_interval_ms < polling.interval_ms {
            return Err(config_error(
                "polling.max_interval_ms must not be below polling.interval_ms",
            ));
        }
        if !polling.backoff_multiplier.is_finite() || polling.backoff_multiplier < 1.0 {
            return Err(config_error("polling.backoff_multiplier must be at least 1.0"));
        }
        if polling.timeout_seconds == 0 {
            return Err(config_error("polling.timeout_seconds must be greater than 0"));
        }

        if self.routing.aggregating_organisation_ids.is_empty() {
            return Err(config_error(
                "routing.aggregating_organisation_ids must name at least one organisation",
            ));
        }

        let mut seen = HashSet::new();
        for variable in &self.variables {
            if !seen.insert(variable.id.as_str()) {
                return Err(config_error(format!(
                    "variable '{}' is listed more than once",
                    variable.id
                )));
            }
            let label_names_other = self
                .variables
                .iter()
                .any(|other| other.id != variable.id && other.label == variable.label);
            let label_shadows_predicate = self
                .variables
                .iter()
                .any(|other| other.id != variable.id && other.id == variable.label);
            if label_names_other || label_shadows_predicate {
                return Err(config_error(format!(
                    "label '{}' of variable '{}' is ambiguous",
                    variable.label, variable.id
                )));
            }
            if variable.categories.is_empty() {
                return Err(config_error(format!(
                    "variable '{}' has no category codes",
                    variable.id
                )));
            }
        }

        if !self.regions.is_empty() && !self.region_codes().contains(&self.heatmap.default_region)
        {
            return Err(config_error(format!(
                "heatmap.default_region '{}' is not one of the configured regions",
                self.heatmap.default_region
            )));
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> DashboardError {
    DashboardError::Configuration(message.into())
}

/// Allowed category codes per queryable variable
///
/// Variables are addressed by predicate or by display label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterTable {
    entries: BTreeMap<String, BTreeSet<String>>,
    labels: BTreeMap<String, String>,
}

impl FilterTable {
    pub fn from_variables(variables: &[VariableConfig]) -> Self {
        let entries = variables
            .iter()
            .map(|v| (v.id.clone(), v.categories.iter().cloned().collect()))
            .collect();
        let labels = variables
            .iter()
            .map(|v| (v.label.clone(), v.id.clone()))
            .collect();
        Self { entries, labels }
    }

    /// Predicate named by `variable`, which may be a predicate or a label
    pub fn predicate_for<'a>(&'a self, variable: &'a str) -> DashboardResult<&'a str> {
        if self.entries.contains_key(variable) {
            return Ok(variable);
        }
        self.labels
            .get(variable)
            .map(String::as_str)
            .ok_or_else(|| DashboardError::malformed_filter_key(variable))
    }

    /// Category codes for `variable`, failing loudly for unknown variables
    pub fn categories_for(&self, variable: &str) -> DashboardResult<&BTreeSet<String>> {
        let predicate = self.predicate_for(variable)?;
        self.entries
            .get(predicate)
            .ok_or_else(|| DashboardError::malformed_filter_key(variable))
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.predicate_for(variable).is_ok()
    }

    /// Predicates of every variable
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
