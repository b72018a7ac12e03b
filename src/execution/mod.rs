//! Pipeline execution: backoff, the Step Runner, the Run Executor, the
//! Claimer loop, the Recovery Orchestrator, and process-local Metrics.

pub mod backoff;
pub mod claimer;
pub mod metrics;
pub mod recovery;
pub mod run_executor;
pub mod step_runner;

pub use backoff::{backoff, default_backoff};
pub use claimer::Claimer;
pub use metrics::{Metrics, MetricsSnapshot};
pub use recovery::RecoveryOrchestrator;
pub use run_executor::{execute, EngineError};
pub use step_runner::run_step;
