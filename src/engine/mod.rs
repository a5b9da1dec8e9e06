//! The harvesting engine: tasks, stages, workers and the phase sequencer.

pub mod metrics;
pub mod sequencer;
pub mod stage;
pub mod task;
pub mod worker;

pub use metrics::{MetricsSnapshot, StageMetrics};
pub use sequencer::{run_harvest, run_stage, wait_primary_drained, wait_quiescent, HarvestSummary};
pub use stage::Stage;
pub use task::{canonical_url, Intent, Pass, Segment, Task, TaskKey, TaskKind};
pub use worker::{run_worker, RowSink, WorkerContext};
