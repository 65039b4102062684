//! Query parameter value objects.

use std::collections::{BTreeMap, BTreeSet};

use super::fingerprint::{fingerprint, heatmap_fingerprint, Fingerprint};

/// Filter key -> allowed category codes
pub type FilterSet = BTreeMap<String, BTreeSet<String>>;

/// Sort and de-duplicate organisation ids
pub fn normalize_organisation_ids(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Semantic parameters of a count query
///
/// Organisation ids are normalized on construction, so two values built from
/// the same organisation set compare equal whatever the input order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryParameters {
    variable: String,
    filters: FilterSet,
    organisation_ids: Vec<i64>,
}

impl QueryParameters {
    pub fn new(
        variable: impl Into<String>,
        filters: FilterSet,
        organisation_ids: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self {
            variable: variable.into(),
            filters,
            organisation_ids: normalize_organisation_ids(organisation_ids),
        }
    }

    /// Identity used before login or with no organisation selected
    pub fn placeholder(variable: impl Into<String>) -> Self {
        Self::new(variable, FilterSet::new(), [])
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn organisation_ids(&self) -> &[i64] {
        &self.organisation_ids
    }

    pub fn is_placeholder(&self) -> bool {
        self.filters.is_empty() && self.organisation_ids.is_empty()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.variable, &self.filters, &self.organisation_ids)
    }
}

/// Semantic parameters of a correlation heatmap query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeatmapParameters {
    region: String,
    organisation_ids: Vec<i64>,
}

impl HeatmapParameters {
    pub fn new(region: impl Into<String>, organisation_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            region: region.into(),
            organisation_ids: normalize_organisation_ids(organisation_ids),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn organisation_ids(&self) -> &[i64] {
        &self.organisation_ids
    }

    pub fn fingerprint(&self) -> Fingerprint {
        heatmap_fingerprint(&self.organisation_ids, &self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organisation_ids_are_normalized() {
        let params = QueryParameters::new("roo:P100018", FilterSet::new(), [5, 2, 5, 3]);
        assert_eq!(params.organisation_ids(), &[2, 3, 5]);
        assert_eq!(
            params,
            QueryParameters::new("roo:P100018", FilterSet::new(), [3, 5, 2])
        );
    }

    #[test]
    fn test_placeholder_identity() {
        let params = QueryParameters::placeholder("Gender");
        assert!(params.is_placeholder());
        assert_eq!(
            params.fingerprint(),
            fingerprint("Gender", &FilterSet::new(), &[])
        );
    }

    #[test]
    fn test_heatmap_parameters_fingerprint_matches_free_function() {
        let params = HeatmapParameters::new("GTV-1", [3, 2]);
        assert_eq!(params.organisation_ids(), &[2, 3]);
        assert_eq!(params.fingerprint(), heatmap_fingerprint(&[2, 3], "GTV-1"));
    }
}
