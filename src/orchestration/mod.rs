//! # Orchestration
//!
//! Cache-first query resolution and in-flight dispatch deduplication.

pub mod inflight;
pub mod query_orchestrator;

pub use inflight::{InFlightRegistry, Join, Lead};
pub use query_orchestrator::{OrchestratorStats, QueryOrchestrator};
