//! Durable status enums for Runs and Steps, and their legal transitions.

use serde::{Deserialize, Serialize};

/// Status of a Run row. Legal transitions: `Pending -> Running`,
/// `Running -> Success`, `Running -> Failed`. No other transition is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl RunStatus {
    /// `finishedAt` is null iff status is Pending or Running.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Status of a Step row, one per Step per Run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Retrying,
    Success,
    Failed,
}

impl StepStatus {
    /// Terminal states are `Success` and `Failed`; once terminal, a Step row
    /// is immutable.
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Success | StepStatus::Failed)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Retrying => "retrying",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}
