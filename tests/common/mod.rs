//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use federated_dashboard::config::DashboardConfig;
use federated_dashboard::dispatch::{PollingPolicy, TaskDispatcher};
use federated_dashboard::identity::Fingerprint;
use federated_dashboard::test_utils::ScriptedPlatform;
use federated_dashboard::QueryOrchestrator;

/// Default configuration with millisecond polling
pub fn fast_config() -> DashboardConfig {
    let mut config = DashboardConfig::default();
    config.polling.interval_ms = 5;
    config.polling.max_interval_ms = 5;
    config.polling.timeout_seconds = 5;
    config
}

pub fn orchestrator(config: &DashboardConfig, platform: Arc<ScriptedPlatform>) -> QueryOrchestrator {
    QueryOrchestrator::new(config, TaskDispatcher::new(platform, config))
}

pub fn orchestrator_with_policy(
    config: &DashboardConfig,
    platform: Arc<ScriptedPlatform>,
    policy: PollingPolicy,
) -> QueryOrchestrator {
    let dispatcher = TaskDispatcher::new(platform, config).with_polling_policy(policy);
    QueryOrchestrator::new(config, dispatcher)
}

/// Wait until a dispatch for `fingerprint` is registered
pub async fn wait_until_in_flight(orchestrator: &QueryOrchestrator, fingerprint: &Fingerprint) {
    for _ in 0..200 {
        if orchestrator.is_in_flight(fingerprint) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("dispatch for {fingerprint} never started");
}

/// Wait until no dispatch for `fingerprint` is registered
pub async fn wait_until_released(orchestrator: &QueryOrchestrator, fingerprint: &Fingerprint) {
    for _ in 0..200 {
        if !orchestrator.is_in_flight(fingerprint) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("dispatch for {fingerprint} was never released");
}
