//! Wire shape of a task creation request.

use serde::{Deserialize, Serialize};

/// Algorithm invocation carried by a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    pub method: String,
    pub master: bool,
    pub kwargs: serde_json::Value,
}

/// Task creation request as accepted by the execution platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub name: String,
    pub description: String,
    pub image: String,
    pub collaboration: i64,
    /// Organisations that run the aggregating part of the algorithm
    pub organizations: Vec<i64>,
    pub input: TaskInput,
    pub data_format: String,
    pub database: String,
}
