use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use federated_dashboard::identity::{
    fingerprint, heatmap_fingerprint, FilterSet, HeatmapParameters, QueryParameters,
};

fn variable_strategy() -> impl Strategy<Value = String> {
    "roo:P[0-9]{6}"
}

fn filters_strategy() -> impl Strategy<Value = FilterSet> {
    prop::collection::btree_map(
        variable_strategy(),
        prop::collection::btree_set("C[0-9]{5}", 0..5),
        0..3,
    )
}

fn organisation_ids_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..40, 0..8)
}

proptest! {
    /// Property: identical inputs always hash to the same key
    #[test]
    fn fingerprint_is_deterministic(
        variable in variable_strategy(),
        filters in filters_strategy(),
        ids in organisation_ids_strategy(),
    ) {
        let first = fingerprint(&variable, &filters, &ids);
        let second = fingerprint(&variable, &filters.clone(), &ids.clone());
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.as_str().len(), 64);
    }

    /// Property: organisation order and duplicates never change the key
    #[test]
    fn fingerprint_ignores_organisation_order(
        variable in variable_strategy(),
        filters in filters_strategy(),
        ids in organisation_ids_strategy(),
    ) {
        let mut reordered: Vec<i64> = ids.iter().rev().copied().collect();
        reordered.extend(ids.iter().take(2));

        prop_assert_eq!(
            fingerprint(&variable, &filters, &ids),
            fingerprint(&variable, &filters, &reordered)
        );
        prop_assert_eq!(
            QueryParameters::new(variable.as_str(), filters.clone(), ids.clone()),
            QueryParameters::new(variable.as_str(), filters, reordered)
        );
    }

    /// Property: filter insertion order never changes the key
    #[test]
    fn fingerprint_ignores_filter_insertion_order(
        variable in variable_strategy(),
        entries in prop::collection::vec((variable_strategy(), prop::collection::vec("C[0-9]{5}", 0..4)), 0..4),
    ) {
        let unique: Vec<(String, Vec<String>)> = entries
            .into_iter()
            .collect::<BTreeMap<_, _>>()
            .into_iter()
            .collect();

        let forward: FilterSet = unique
            .iter()
            .map(|(key, codes)| (key.clone(), codes.iter().cloned().collect::<BTreeSet<_>>()))
            .collect();
        let backward: FilterSet = unique
            .iter()
            .rev()
            .map(|(key, codes)| (key.clone(), codes.iter().rev().cloned().collect::<BTreeSet<_>>()))
            .collect();

        prop_assert_eq!(
            fingerprint(&variable, &forward, &[]),
            fingerprint(&variable, &backward, &[])
        );
    }

    /// Property: different variables never share a key
    #[test]
    fn distinct_variables_do_not_collide(
        a in variable_strategy(),
        b in variable_strategy(),
        filters in filters_strategy(),
        ids in organisation_ids_strategy(),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(fingerprint(&a, &filters, &ids), fingerprint(&b, &filters, &ids));
    }

    /// Property: heatmap keys ignore organisation order
    #[test]
    fn heatmap_fingerprint_ignores_organisation_order(
        ids in organisation_ids_strategy(),
        region in prop::sample::select(vec!["GTV-1", "GTV-2"]),
    ) {
        let reversed: Vec<i64> = ids.iter().rev().copied().collect();
        prop_assert_eq!(
            heatmap_fingerprint(&ids, region),
            heatmap_fingerprint(&reversed, region)
        );
        prop_assert_eq!(
            HeatmapParameters::new(region, ids.clone()).fingerprint(),
            heatmap_fingerprint(&ids, region)
        );
    }
}
