//! Cache-first resolution, dispatch deduplication and failure handling.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use federated_dashboard::dispatch::PollingPolicy;
use federated_dashboard::identity::{fingerprint, heatmap_fingerprint, FilterSet};
use federated_dashboard::test_utils::ScriptedPlatform;
use federated_dashboard::{DashboardError, RemoteComputationError};
use futures::future::join_all;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_repeated_query_is_served_from_cache() {
    let config = fast_config();
    let platform = Arc::new(ScriptedPlatform::new().with_pending_polls(2));
    let orchestrator = orchestrator(&config, platform.clone());

    let first = assert_ok!(orchestrator.resolve_variable("roo:P100018", &[2, 3]).await);
    let second = assert_ok!(orchestrator.resolve_variable("roo:P100018", &[3, 2]).await);

    assert_eq!(first, second);
    assert_eq!(platform.submit_count(), 1);

    let stats = orchestrator.stats();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.dispatches, 1);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test]
async fn test_miss_dispatches_once_and_merges_new_fingerprint() {
    let config = fast_config();
    let platform = Arc::new(ScriptedPlatform::new());
    let orchestrator = orchestrator(&config, platform.clone());
    let cache = orchestrator.result_cache();
    let fingerprints_before = cache.fingerprint_count();

    let params = orchestrator
        .count_parameters("roo:P100244", &[2, 3])
        .unwrap();
    let expected = params.fingerprint();
    assert!(cache.lookup(&expected).is_none());

    let rows = assert_ok!(orchestrator.resolve(&params).await);

    assert_eq!(platform.submit_count(), 1);
    assert_eq!(cache.fingerprint_count(), fingerprints_before + 1);
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|row| row.fingerprint == expected));
    assert_eq!(cache.lookup(&expected), Some(rows));

    let submission = &platform.submissions()[0];
    assert_eq!(submission.input.kwargs["organization_ids"], json!([2, 3]));
    assert_eq!(
        submission.input.kwargs["filters"]["roo:P100244"],
        json!(["C48719", "C48720", "C48724", "C48728", "C48732"])
    );
}

#[tokio::test]
async fn test_failed_dispatch_leaves_cache_unchanged() {
    let config = fast_config();
    let platform = Arc::new(
        ScriptedPlatform::new()
            .with_pending_polls(1)
            .with_failure("node unreachable"),
    );
    let orchestrator = orchestrator(&config, platform.clone());
    let cache = orchestrator.result_cache();
    let rows_before = cache.len();
    let fingerprints_before = cache.fingerprint_count();

    let error = assert_err!(orchestrator.resolve_variable("roo:P100018", &[2]).await);

    assert!(matches!(
        error,
        DashboardError::RemoteComputation(RemoteComputationError::TaskFailed { .. })
    ));
    assert_eq!(cache.len(), rows_before);
    assert_eq!(cache.fingerprint_count(), fingerprints_before);
    assert_eq!(orchestrator.stats().dispatch_failures, 1);

    // A failure is not cached: the next attempt dispatches again.
    assert_err!(orchestrator.resolve_variable("roo:P100018", &[2]).await);
    assert_eq!(platform.submit_count(), 2);
}

#[tokio::test]
async fn test_default_identity_is_served_without_dispatch() {
    let config = fast_config();
    let platform = Arc::new(ScriptedPlatform::new());
    let orchestrator = orchestrator(&config, platform.clone());

    let default_key = fingerprint("Gender", &FilterSet::new(), &[]);
    let seeded = orchestrator
        .result_cache()
        .lookup(&default_key)
        .expect("placeholder rows are seeded");

    let rows = assert_ok!(orchestrator.resolve_variable("Gender", &[]).await);

    assert_eq!(rows, seeded);
    assert_eq!(rows[0].category, "0.0");
    assert_eq!(rows[0].value, 2.0);
    assert_eq!(rows[1].value, 4.0);
    assert_eq!(platform.submit_count(), 0);
    assert_eq!(orchestrator.stats().cache_hits, 1);
}

#[tokio::test]
async fn test_label_query_dispatches_by_predicate() {
    let config = fast_config();
    let platform = Arc::new(ScriptedPlatform::new());
    let orchestrator = orchestrator(&config, platform.clone());

    let by_label = assert_ok!(orchestrator.resolve_variable("Gender", &[3, 2]).await);
    let by_predicate = assert_ok!(orchestrator.resolve_variable("roo:P100018", &[2, 3]).await);

    assert_eq!(by_label, by_predicate);
    assert_eq!(platform.submit_count(), 1);
    assert_eq!(
        platform.submissions()[0].input.kwargs["predicates"],
        json!("roo:P100018")
    );
    assert_eq!(
        by_label[0].fingerprint,
        orchestrator
            .count_parameters("roo:P100018", &[2, 3])
            .unwrap()
            .fingerprint()
    );
}

#[tokio::test]
async fn test_placeholder_variable_never_dispatches() {
    let config = fast_config();
    let platform = Arc::new(ScriptedPlatform::new());
    let orchestrator = orchestrator(&config, platform.clone());

    let rows = assert_ok!(
        orchestrator
            .resolve_variable("Not an actual variable", &[2, 3])
            .await
    );

    assert_eq!(rows.len(), 2);
    assert_eq!(platform.submit_count(), 0);
}

#[tokio::test]
async fn test_unknown_variable_fails_fast() {
    let config = fast_config();
    let platform = Arc::new(ScriptedPlatform::new());
    let orchestrator = orchestrator(&config, platform.clone());

    let error = assert_err!(orchestrator.resolve_variable("roo:P999999", &[2]).await);
    assert_eq!(error, DashboardError::malformed_filter_key("roo:P999999"));

    let error = assert_err!(orchestrator.resolve_variable("roo:P999999", &[]).await);
    assert_eq!(error, DashboardError::malformed_filter_key("roo:P999999"));
    assert_eq!(platform.submit_count(), 0);
}

#[tokio::test]
async fn test_heatmap_key_ignores_organisation_order() {
    let config = fast_config();
    let platform = Arc::new(ScriptedPlatform::new());
    let orchestrator = orchestrator(&config, platform.clone());

    let first = assert_ok!(orchestrator.resolve_heatmap("GTV-1", &[2, 3]).await);
    let second = assert_ok!(orchestrator.resolve_heatmap("GTV-1", &[3, 2]).await);

    assert_eq!(first, second);
    assert_eq!(platform.submit_count(), 1);
    assert_eq!(first.region, "GTV-1");
    assert_eq!(first.columns.len(), 4);
    assert_eq!(first.value("censor", "censor"), Some(1.0));
    assert!(orchestrator
        .heatmap_cache()
        .contains(&heatmap_fingerprint(&[2, 3], "GTV-1")));
}

#[tokio::test]
async fn test_heatmap_without_organisations_uses_placeholder() {
    let config = fast_config();
    let platform = Arc::new(ScriptedPlatform::new());
    let orchestrator = orchestrator(&config, platform.clone());

    let table = assert_ok!(orchestrator.resolve_heatmap("GTV-2", &[]).await);

    assert_eq!(table.region, "GTV-1");
    assert_eq!(table.columns.len(), 10);
    assert_eq!(table.value("Column_3", "Column_3"), Some(1.0));
    assert_eq!(platform.submit_count(), 0);

    let error = assert_err!(orchestrator.resolve_heatmap("GTV-9", &[2]).await);
    assert_eq!(error, DashboardError::unknown_region("GTV-9"));
}

#[tokio::test]
async fn test_concurrent_identical_queries_share_one_dispatch() {
    let config = fast_config();
    let platform = Arc::new(ScriptedPlatform::new().with_pending_polls(4));
    let orchestrator = orchestrator(&config, platform.clone());

    let queries = (0..8).map(|i| {
        let orchestrator = orchestrator.clone();
        let ids = if i % 2 == 0 { vec![2, 3, 4] } else { vec![4, 3, 2] };
        async move { orchestrator.resolve_variable("roo:P100241", &ids).await }
    });
    let results = join_all(queries).await;

    let first = results[0].clone().unwrap();
    for result in results {
        assert_eq!(result.unwrap(), first);
    }
    assert_eq!(platform.submit_count(), 1);

    let stats = orchestrator.stats();
    assert_eq!(stats.dispatches, 1);
    assert_eq!(stats.shared_waits + stats.cache_hits, 7);
}

#[tokio::test]
async fn test_cancel_fails_waiters_and_releases_registry() {
    let config = fast_config();
    let platform = Arc::new(ScriptedPlatform::new().never_completes());
    let orchestrator = orchestrator(&config, platform.clone());
    let key = orchestrator
        .count_parameters("roo:P100018", &[2, 3])
        .unwrap()
        .fingerprint();

    let waiter = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.resolve_variable("roo:P100018", &[2, 3]).await })
    };
    wait_until_in_flight(&orchestrator, &key).await;

    assert!(orchestrator.cancel(&key));
    let error = assert_err!(waiter.await.unwrap());

    assert!(matches!(
        error,
        DashboardError::RemoteComputation(RemoteComputationError::Cancelled { .. })
    ));
    wait_until_released(&orchestrator, &key).await;
    assert!(!orchestrator.result_cache().contains(&key));
    assert!(!orchestrator.cancel(&key));
}

#[tokio::test]
async fn test_pending_task_times_out() {
    let config = fast_config();
    let platform = Arc::new(ScriptedPlatform::new().never_completes());
    let orchestrator = orchestrator_with_policy(
        &config,
        platform.clone(),
        PollingPolicy::fixed(Duration::from_millis(10), Duration::from_millis(80)),
    );

    let error = assert_err!(orchestrator.resolve_heatmap("GTV-2", &[2]).await);

    assert!(matches!(
        error,
        DashboardError::RemoteComputation(RemoteComputationError::Timeout { .. })
    ));
    assert_eq!(platform.fetch_count(), 0);
    assert_eq!(orchestrator.stats().in_flight, 0);
}

#[tokio::test]
async fn test_dropped_caller_does_not_abandon_dispatch() {
    let config = fast_config();
    let platform = Arc::new(ScriptedPlatform::new().with_pending_polls(5));
    let orchestrator = orchestrator(&config, platform.clone());
    let key = orchestrator
        .count_parameters("roo:P100254", &[5])
        .unwrap()
        .fingerprint();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(1),
        orchestrator.resolve_variable("roo:P100254", &[5]),
    )
    .await;
    assert!(abandoned.is_err());

    wait_until_released(&orchestrator, &key).await;
    assert!(orchestrator.result_cache().contains(&key));

    assert_ok!(orchestrator.resolve_variable("roo:P100254", &[5]).await);
    assert_eq!(platform.submit_count(), 1);
}
