#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Federated Dashboard Core
//!
//! Result caching and remote task dispatch for a dashboard that visualizes
//! federated-analysis results.
//!
//! ## Overview
//!
//! A user authenticates against a coordinating server, selects participating
//! organisations, and the dashboard asks the remote execution platform to
//! compute aggregates (category counts, correlation matrices) across those
//! organisations. Every result is cached under a fingerprint of the query's
//! semantic parameters so that a repeated query never triggers a second
//! remote computation within a session.
//!
//! ## Module Organization
//!
//! - [`identity`] - Query parameters and deterministic fingerprints
//! - [`cache`] - Append-only result stores for counts and heatmaps
//! - [`platform`] - Execution-platform and authentication collaborator traits
//! - [`dispatch`] - Task specifications, polling state machine, payload conversion
//! - [`orchestration`] - The query façade with in-flight deduplication
//! - [`session`] - Session context used by the UI layer
//! - [`config`] - Layered configuration loading
//! - [`error`] - Structured error handling
//! - [`logging`] - Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use federated_dashboard::config::DashboardConfig;
//! use federated_dashboard::session::DashboardSession;
//! use federated_dashboard::test_utils::{ScriptedPlatform, StaticAuthenticator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DashboardConfig::default();
//! let platform = Arc::new(ScriptedPlatform::new());
//! let authenticator = Arc::new(StaticAuthenticator::with_default_directory("user", "secret"));
//!
//! let session = DashboardSession::new(&config, platform, authenticator)?;
//!
//! // Before login every query is served from the placeholder dataset
//! let rows = session.counts("roo:P100018").await?;
//! assert!(!rows.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod logging;
pub mod orchestration;
pub mod platform;
pub mod session;
pub mod test_utils;

pub use cache::{HeatmapCache, HeatmapTable, ResultCache, ResultRow};
pub use config::{ConfigManager, DashboardConfig};
pub use dispatch::{TaskDispatcher, TaskSpec};
pub use error::{
    AuthenticationError, DashboardError, DashboardResult, PlatformError, RemoteComputationError,
};
pub use identity::{Fingerprint, QueryParameters};
pub use orchestration::QueryOrchestrator;
pub use platform::{Authenticator, ExecutionPlatform, OrganisationDirectory, TaskHandle, TaskStatus};
pub use session::DashboardSession;
