//! CLI command definitions

use clap::Args;

/// Run worker: hosts `claimer_worker_count` Claimer loops plus the Recovery
/// Orchestrator, until interrupted.
#[derive(Debug, Args, Clone)]
pub struct WorkerCommand {
    /// Number of concurrent Claimer loops to run in this process (overrides
    /// `CLAIMER_WORKER_COUNT`).
    #[arg(long)]
    pub workers: Option<usize>,
}

/// Trigger a new Run of a registered pipeline.
#[derive(Debug, Args, Clone)]
pub struct TriggerCommand {
    /// Name of a pipeline already present in the Registry.
    pub pipeline: String,

    /// Opaque trigger source recorded on the Run (defaults to "manual").
    #[arg(long, default_value = "manual")]
    pub triggered_by: String,
}

/// List every registered pipeline with its run-history summary.
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show one Run's status and the status of every one of its Steps.
#[derive(Debug, Args, Clone)]
pub struct GetCommand {
    /// Run id
    pub run_id: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Retry a terminally-failed Run by creating a fresh Run for the same
/// pipeline.
#[derive(Debug, Args, Clone)]
pub struct RetryCommand {
    /// Run id of a Run currently in `failed` status
    pub run_id: String,
}
