//! # Task Dispatcher
//!
//! Runs one remote computation end to end: submit, poll until a terminal
//! state, fetch the payload and convert it into cache rows. Submission is
//! never retried; any failure after it terminates the dispatch in
//! [`DispatchState::Failed`] and nothing is returned for merging.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::cache::{HeatmapEntry, ResultRow};
use crate::config::{DashboardConfig, HeatmapConfig, RoutingConfig};
use crate::error::RemoteComputationError;
use crate::platform::{ExecutionPlatform, TaskHandle, TaskStatus};

use super::artifacts::ArtifactWriter;
use super::payload::{count_rows, heatmap_entry};
use super::polling::{CancellationHandle, DispatchState, PollingPolicy};
use super::task_spec::{CountQuerySpec, HeatmapQuerySpec, TaskSpec};

#[derive(Debug, Clone)]
pub struct TaskDispatcher {
    platform: Arc<dyn ExecutionPlatform>,
    routing: RoutingConfig,
    heatmap: HeatmapConfig,
    policy: PollingPolicy,
    artifacts: Option<ArtifactWriter>,
}

impl TaskDispatcher {
    pub fn new(platform: Arc<dyn ExecutionPlatform>, config: &DashboardConfig) -> Self {
        Self {
            platform,
            routing: config.routing.clone(),
            heatmap: config.heatmap.clone(),
            policy: PollingPolicy::from(&config.polling),
            artifacts: ArtifactWriter::from_config(&config.persistence),
        }
    }

    pub fn with_polling_policy(mut self, policy: PollingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_artifact_writer(mut self, writer: ArtifactWriter) -> Self {
        self.artifacts = Some(writer);
        self
    }

    pub fn polling_policy(&self) -> &PollingPolicy {
        &self.policy
    }

    /// Compute category counts and convert them into cache rows
    pub async fn run_counts(
        &self,
        spec: &CountQuerySpec,
        cancel: &CancellationHandle,
    ) -> Result<Vec<ResultRow>, RemoteComputationError> {
        let payload = self.execute(&TaskSpec::Count(spec.clone()), cancel).await?;
        count_rows(&payload, spec)
    }

    /// Compute a correlation matrix and convert it into a heatmap entry
    pub async fn run_heatmap(
        &self,
        spec: &HeatmapQuerySpec,
        cancel: &CancellationHandle,
    ) -> Result<HeatmapEntry, RemoteComputationError> {
        let payload = self.execute(&TaskSpec::Heatmap(spec.clone()), cancel).await?;
        heatmap_entry(&payload, spec)
    }

    /// Submit, poll to completion and fetch the raw payload
    #[instrument(skip(self, spec, cancel), fields(kind = spec.kind()))]
    pub async fn execute(
        &self,
        spec: &TaskSpec,
        cancel: &CancellationHandle,
    ) -> Result<Value, RemoteComputationError> {
        let label = spec.label();
        let submission = spec.to_submission(&self.routing, &self.heatmap);

        let handle = self.platform.submit(&submission).await.map_err(|source| {
            warn!(label = %label, error = %source, "Task submission failed");
            RemoteComputationError::SubmissionFailed {
                label: label.clone(),
                source,
            }
        })?;

        let mut state = DispatchState::Submitted;
        transition(&mut state, DispatchState::Pending, &handle);
        info!(task_id = handle.task_id, label = %label, "Task submitted");

        if let Err(error) = self.await_completion(&handle, &mut state, cancel).await {
            transition(&mut state, DispatchState::Failed, &handle);
            warn!(task_id = handle.task_id, error = %error, "Task did not complete");
            return Err(error);
        }

        let payload = match self.platform.fetch_result(&handle).await {
            Ok(payload) => payload,
            Err(source) => {
                transition(&mut state, DispatchState::Failed, &handle);
                return Err(RemoteComputationError::FetchFailed {
                    task_id: handle.task_id,
                    source,
                });
            }
        };
        transition(&mut state, DispatchState::Complete, &handle);

        if let Some(writer) = &self.artifacts {
            writer.persist(&label, spec.parameter(), &payload).await;
        }

        Ok(payload)
    }

    async fn await_completion(
        &self,
        handle: &TaskHandle,
        state: &mut DispatchState,
        cancel: &CancellationHandle,
    ) -> Result<(), RemoteComputationError> {
        let deadline = Instant::now() + self.policy.timeout;
        let timeout_error = || RemoteComputationError::Timeout {
            task_id: handle.task_id,
            timeout_ms: duration_ms(self.policy.timeout),
        };
        let cancelled_error = || RemoteComputationError::Cancelled {
            task_id: handle.task_id,
        };

        let mut interval = self.policy.interval;
        let mut polls: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(cancelled_error());
            }

            polls += 1;
            let status = tokio::select! {
                result = self.platform.poll(handle) => result,
                _ = cancel.cancelled() => return Err(cancelled_error()),
                _ = tokio::time::sleep_until(deadline) => return Err(timeout_error()),
            };

            match status {
                Ok(TaskStatus::Complete) => {
                    debug!(task_id = handle.task_id, polls, "Task complete");
                    return Ok(());
                }
                Ok(TaskStatus::Failed { reason }) => {
                    return Err(RemoteComputationError::TaskFailed {
                        task_id: handle.task_id,
                        reason,
                    });
                }
                Err(source) => {
                    return Err(RemoteComputationError::PollFailed {
                        task_id: handle.task_id,
                        source,
                    });
                }
                Ok(TaskStatus::Pending) => {
                    transition(state, DispatchState::Pending, handle);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(timeout_error());
            }

            debug!(
                task_id = handle.task_id,
                polls,
                wait_ms = duration_ms(interval),
                "Waiting for results"
            );
            tokio::select! {
                _ = tokio::time::sleep(interval.min(deadline - now)) => {}
                _ = cancel.cancelled() => return Err(cancelled_error()),
            }
            interval = self.policy.next_interval(interval);
        }
    }
}

fn transition(state: &mut DispatchState, next: DispatchState, handle: &TaskHandle) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid dispatch transition {state} -> {next}"
    );
    if *state != next {
        debug!(task_id = handle.task_id, from = %state, to = %next, "Dispatch state changed");
    }
    *state = next;
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
