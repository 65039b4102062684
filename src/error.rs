//! Error types for the dashboard core.
//!
//! Every error is `Clone + PartialEq`: a single failed dispatch is broadcast to
//! every caller waiting on the same fingerprint.

use thiserror::Error;

pub type DashboardResult<T> = Result<T, DashboardError>;

/// Top-level error returned by the session and orchestration façades
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),
    #[error("Remote computation error: {0}")]
    RemoteComputation(#[from] RemoteComputationError),
    /// The variable has no entry in the filter table
    #[error("No filter table entry for variable '{variable}'")]
    MalformedFilterKey { variable: String },
    #[error("Unknown region of interest '{region}'")]
    UnknownRegion { region: String },
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DashboardError {
    pub fn malformed_filter_key(variable: impl Into<String>) -> Self {
        Self::MalformedFilterKey {
            variable: variable.into(),
        }
    }

    pub fn unknown_region(region: impl Into<String>) -> Self {
        Self::UnknownRegion {
            region: region.into(),
        }
    }

    /// True when the failure came from the remote platform rather than from
    /// local configuration or programmer error
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteComputation(_))
    }
}

/// Failures raised by the authentication collaborator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthenticationError {
    #[error("Invalid credentials for user '{username}'")]
    InvalidCredentials { username: String },
    #[error("Authentication service unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by an execution-platform implementation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlatformError {
    #[error("Execution platform unavailable: {0}")]
    Unavailable(String),
    #[error("Request rejected by execution platform: {0}")]
    Rejected(String),
    #[error("Task {task_id} not found")]
    TaskNotFound { task_id: i64 },
    #[error("Invalid response: {field} - {reason}")]
    InvalidResponse { field: String, reason: String },
}

impl PlatformError {
    pub fn invalid_response(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A remote computation did not produce a usable result.
///
/// The cache is never updated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteComputationError {
    #[error("Task submission '{label}' failed: {source}")]
    SubmissionFailed {
        label: String,
        #[source]
        source: PlatformError,
    },
    #[error("Polling task {task_id} failed: {source}")]
    PollFailed {
        task_id: i64,
        #[source]
        source: PlatformError,
    },
    #[error("Task {task_id} failed remotely: {reason}")]
    TaskFailed { task_id: i64, reason: String },
    #[error("Fetching result of task {task_id} failed: {source}")]
    FetchFailed {
        task_id: i64,
        #[source]
        source: PlatformError,
    },
    #[error("Malformed result payload: {reason}")]
    MalformedPayload { reason: String },
    #[error("Task {task_id} did not complete within {timeout_ms}ms")]
    Timeout { task_id: i64, timeout_ms: u64 },
    #[error("Task {task_id} was cancelled while pending")]
    Cancelled { task_id: i64 },
    /// The background worker ended without reporting an outcome
    #[error("Dispatch for {fingerprint} ended without a result")]
    Interrupted { fingerprint: String },
}

impl RemoteComputationError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Task id of the remote job, when one was created
    pub fn task_id(&self) -> Option<i64> {
        match self {
            Self::PollFailed { task_id, .. }
            | Self::TaskFailed { task_id, .. }
            | Self::FetchFailed { task_id, .. }
            | Self::Timeout { task_id, .. }
            | Self::Cancelled { task_id } => Some(*task_id),
            Self::SubmissionFailed { .. }
            | Self::MalformedPayload { .. }
            | Self::Interrupted { .. } => None,
        }
    }
}
