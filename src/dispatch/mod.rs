//! # Remote Task Dispatch
//!
//! Typed task specifications, the polling state machine, payload conversion
//! and diagnostic artifact persistence.

pub mod artifacts;
pub mod dispatcher;
pub mod payload;
pub mod polling;
pub mod task_spec;

pub use artifacts::ArtifactWriter;
pub use dispatcher::TaskDispatcher;
pub use payload::{count_rows, heatmap_entry};
pub use polling::{CancellationHandle, DispatchState, PollingPolicy};
pub use task_spec::{CountQuerySpec, HeatmapQuerySpec, TaskSpec};
