//! Typed task specifications.
//!
//! Specs carry only the semantic parameters of a query. Routing metadata and
//! the platform's wire shape are applied in [`TaskSpec::to_submission`].

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{HeatmapConfig, RoutingConfig};
use crate::constants::routing::MASTER_METHOD;
use crate::identity::{FilterSet, HeatmapParameters, QueryParameters};
use crate::platform::{TaskInput, TaskSubmission};

const COUNT_DESCRIPTION: &str = "Retrieve the unique values and their counts using a SPARQL query";
const HEATMAP_DESCRIPTION: &str = "Retrieve the correlation matrix using a SPARQL query";

/// Category counts of one variable across the selected organisations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountQuerySpec {
    pub variable: String,
    pub filters: FilterSet,
    pub organisation_ids: Vec<i64>,
}

impl From<&QueryParameters> for CountQuerySpec {
    fn from(params: &QueryParameters) -> Self {
        Self {
            variable: params.variable().to_string(),
            filters: params.filters().clone(),
            organisation_ids: params.organisation_ids().to_vec(),
        }
    }
}

/// Correlation matrix for one region of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapQuerySpec {
    pub region: String,
    pub organisation_ids: Vec<i64>,
}

impl From<&HeatmapParameters> for HeatmapQuerySpec {
    fn from(params: &HeatmapParameters) -> Self {
        Self {
            region: params.region().to_string(),
            organisation_ids: params.organisation_ids().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskSpec {
    Count(CountQuerySpec),
    Heatmap(HeatmapQuerySpec),
}

impl TaskSpec {
    /// Human-readable task name shown on the platform
    pub fn label(&self) -> String {
        match self {
            Self::Count(spec) => format!("Dashboard request of counts for {}", spec.variable),
            Self::Heatmap(spec) => {
                format!("Heatmap for {:?} with filter ROI", spec.organisation_ids)
            }
        }
    }

    /// Distinguishing parameter used in artifact file names
    pub fn parameter(&self) -> &str {
        match self {
            Self::Count(spec) => &spec.variable,
            Self::Heatmap(spec) => &spec.region,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Count(_) => "count",
            Self::Heatmap(_) => "heatmap",
        }
    }

    /// Build the platform request for this spec
    pub fn to_submission(&self, routing: &RoutingConfig, heatmap: &HeatmapConfig) -> TaskSubmission {
        let (description, image, kwargs) = match self {
            Self::Count(spec) => (
                COUNT_DESCRIPTION,
                &routing.count_image,
                json!({
                    "predicates": spec.variable,
                    "filters": spec.filters,
                    "organization_ids": spec.organisation_ids,
                }),
            ),
            Self::Heatmap(spec) => (
                HEATMAP_DESCRIPTION,
                &routing.heatmap_image,
                json!({
                    "expl_vars": heatmap.explanatory_variables,
                    "censor_col": heatmap.censor_column,
                    "roitype": spec.region,
                    "organization_ids": spec.organisation_ids,
                }),
            ),
        };

        TaskSubmission {
            name: self.label(),
            description: description.to_string(),
            image: image.clone(),
            collaboration: routing.collaboration_id,
            organizations: routing.aggregating_organisation_ids.clone(),
            input: TaskInput {
                method: MASTER_METHOD.to_string(),
                master: true,
                kwargs,
            },
            data_format: routing.data_format.clone(),
            database: routing.database.clone(),
        }
    }
}

impl From<CountQuerySpec> for TaskSpec {
    fn from(spec: CountQuerySpec) -> Self {
        Self::Count(spec)
    }
}

impl From<HeatmapQuerySpec> for TaskSpec {
    fn from(spec: HeatmapQuerySpec) -> Self {
        Self::Heatmap(spec)
    }
}
