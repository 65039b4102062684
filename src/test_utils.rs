//! Test doubles for the external collaborators.
//!
//! [`ScriptedPlatform`] answers submits, polls and fetches from a script and
//! counts every call. Without a scripted payload it derives a plausible one
//! from the submission, so any count or heatmap query completes.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::constants::COUNT_KEY_SUFFIX;
use crate::error::{AuthenticationError, PlatformError};
use crate::platform::{
    Authenticator, ExecutionPlatform, Organisation, OrganisationDirectory, TaskHandle, TaskStatus,
    TaskSubmission,
};

#[derive(Debug, Clone, PartialEq)]
enum TerminalStatus {
    Complete,
    Failed(String),
    Never,
}

#[derive(Debug)]
pub struct ScriptedPlatform {
    pending_polls: u32,
    terminal: TerminalStatus,
    payload: Option<Value>,
    submit_error: Option<PlatformError>,
    poll_error: Option<PlatformError>,
    fetch_error: Option<PlatformError>,
    poll_delay: Option<Duration>,
    next_task_id: AtomicI64,
    submissions: Mutex<HashMap<i64, TaskSubmission>>,
    polls_per_task: Mutex<HashMap<i64, u32>>,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl Default for ScriptedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPlatform {
    /// Platform whose tasks complete on the first poll
    pub fn new() -> Self {
        Self {
            pending_polls: 0,
            terminal: TerminalStatus::Complete,
            payload: None,
            submit_error: None,
            poll_error: None,
            fetch_error: None,
            poll_delay: None,
            next_task_id: AtomicI64::new(1),
            submissions: Mutex::new(HashMap::new()),
            polls_per_task: Mutex::new(HashMap::new()),
            submit_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Report `Pending` for the first `polls` polls of every task
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// End every task in `Failed` instead of `Complete`
    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.terminal = TerminalStatus::Failed(reason.into());
        self
    }

    /// Keep every task pending forever
    pub fn never_completes(mut self) -> Self {
        self.terminal = TerminalStatus::Never;
        self
    }

    pub fn with_submit_error(mut self, error: PlatformError) -> Self {
        self.submit_error = Some(error);
        self
    }

    pub fn with_poll_error(mut self, error: PlatformError) -> Self {
        self.poll_error = Some(error);
        self
    }

    pub fn with_fetch_error(mut self, error: PlatformError) -> Self {
        self.fetch_error = Some(error);
        self
    }

    /// Delay every poll response
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = Some(delay);
        self
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Accepted submissions ordered by task id
    pub fn submissions(&self) -> Vec<TaskSubmission> {
        let submissions = self.submissions.lock();
        let mut ids: Vec<_> = submissions.keys().copied().collect();
        ids.sort_unstable();
        ids.iter().map(|id| submissions[id].clone()).collect()
    }

    fn derived_payload(submission: &TaskSubmission) -> Value {
        let kwargs = &submission.input.kwargs;
        if let Some(variable) = kwargs.get("predicates").and_then(Value::as_str) {
            let mut counts = Map::new();
            counts.insert(
                format!("{variable}{COUNT_KEY_SUFFIX}"),
                json!({"0.0": 10, "1.0": 20}),
            );
            return Value::Object(counts);
        }

        let mut names: Vec<String> = kwargs
            .get("expl_vars")
            .and_then(Value::as_array)
            .map(|vars| vars.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        if let Some(censor) = kwargs.get("censor_col").and_then(Value::as_str) {
            names.push(censor.to_string());
        }

        let mut columns = Map::new();
        for column in &names {
            let cells = names
                .iter()
                .map(|row| {
                    let value = if row == column { 1.0 } else { 0.5 };
                    (row.clone(), json!(value))
                })
                .collect::<Map<_, _>>();
            columns.insert(column.clone(), Value::Object(cells));
        }
        Value::Object(columns)
    }
}

#[async_trait]
impl ExecutionPlatform for ScriptedPlatform {
    async fn submit(&self, submission: &TaskSubmission) -> Result<TaskHandle, PlatformError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.submit_error {
            return Err(error.clone());
        }
        let task_id = self.next_task_id.fetch_add(1, Ordering::SeqCst);
        self.submissions.lock().insert(task_id, submission.clone());
        Ok(TaskHandle::new(task_id))
    }

    async fn poll(&self, handle: &TaskHandle) -> Result<TaskStatus, PlatformError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.poll_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.poll_error {
            return Err(error.clone());
        }
        if !self.submissions.lock().contains_key(&handle.task_id) {
            return Err(PlatformError::TaskNotFound {
                task_id: handle.task_id,
            });
        }

        let polls = {
            let mut polls_per_task = self.polls_per_task.lock();
            let polls = polls_per_task.entry(handle.task_id).or_insert(0);
            *polls += 1;
            *polls
        };
        if polls <= self.pending_polls {
            return Ok(TaskStatus::Pending);
        }

        Ok(match &self.terminal {
            TerminalStatus::Complete => TaskStatus::Complete,
            TerminalStatus::Failed(reason) => TaskStatus::Failed {
                reason: reason.clone(),
            },
            TerminalStatus::Never => TaskStatus::Pending,
        })
    }

    async fn fetch_result(&self, handle: &TaskHandle) -> Result<Value, PlatformError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.fetch_error {
            return Err(error.clone());
        }
        if let Some(payload) = &self.payload {
            return Ok(payload.clone());
        }
        let submissions = self.submissions.lock();
        let submission = submissions
            .get(&handle.task_id)
            .ok_or(PlatformError::TaskNotFound {
                task_id: handle.task_id,
            })?;
        Ok(Self::derived_payload(submission))
    }
}

/// Authenticator accepting a single username/password pair
#[derive(Debug)]
pub struct StaticAuthenticator {
    username: String,
    password: String,
    directory: OrganisationDirectory,
    unavailable: Option<String>,
    login_calls: AtomicUsize,
}

impl StaticAuthenticator {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        directory: OrganisationDirectory,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            directory,
            unavailable: None,
            login_calls: AtomicUsize::new(0),
        }
    }

    /// Directory with the four standard dashboard organisations
    pub fn with_default_directory(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(username, password, default_directory())
    }

    /// Fail every login as if the server could not be reached
    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable = Some(reason.into());
        self
    }

    pub fn login_count(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<OrganisationDirectory, AuthenticationError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.unavailable {
            return Err(AuthenticationError::Unavailable(reason.clone()));
        }
        if username != self.username || password != self.password {
            return Err(AuthenticationError::InvalidCredentials {
                username: username.to_string(),
            });
        }
        Ok(self.directory.clone())
    }
}

pub fn default_directory() -> OrganisationDirectory {
    let organisation = |id: i64, name: &str, country: &str| Organisation {
        id,
        name: name.to_string(),
        country: country.to_string(),
    };
    OrganisationDirectory::new(vec![
        organisation(2, "HN1_Maastro", "Netherlands"),
        organisation(3, "Montreal", "Canada"),
        organisation(4, "Toronto", "Canada"),
        organisation(5, "HN3_Maastro", "Netherlands"),
    ])
}
