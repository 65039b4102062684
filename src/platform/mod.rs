//! # External Collaborators
//!
//! Traits for the remote task-execution platform and the authentication
//! service. The dashboard core never talks to the network directly; a host
//! application supplies implementations, tests use the doubles in
//! [`crate::test_utils`].

pub mod directory;
pub mod submission;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthenticationError, PlatformError};

pub use directory::{DirectorySummary, Organisation, OrganisationDirectory};
pub use submission::{TaskInput, TaskSubmission};

/// Identifier of a dispatched remote job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle {
    pub task_id: i64,
}

impl TaskHandle {
    pub fn new(task_id: i64) -> Self {
        Self { task_id }
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.task_id)
    }
}

/// Completion state reported by a single poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Complete,
    Failed { reason: String },
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Remote task-execution platform
#[async_trait]
pub trait ExecutionPlatform: Send + Sync + fmt::Debug {
    /// Create a remote task; never retried by the caller
    async fn submit(&self, submission: &TaskSubmission) -> Result<TaskHandle, PlatformError>;

    async fn poll(&self, handle: &TaskHandle) -> Result<TaskStatus, PlatformError>;

    /// Aggregated result of a completed task
    async fn fetch_result(&self, handle: &TaskHandle) -> Result<serde_json::Value, PlatformError>;
}

/// Authentication against the coordinating server
#[async_trait]
pub trait Authenticator: Send + Sync + fmt::Debug {
    async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<OrganisationDirectory, AuthenticationError>;
}
