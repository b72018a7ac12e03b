//! CLI output formatting

use console::Emoji;

use crate::core::state::{RunStatus, StepStatus};
use crate::facade::{PipelineSummary, RunDetail};
use crate::persistence::{Run, Step};

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a Run status for display.
pub fn format_run_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Success => style("SUCCESS").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format a Step status for display.
pub fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::Pending => style("PENDING").dim().to_string(),
        StepStatus::Running => style("RUNNING").yellow().to_string(),
        StepStatus::Retrying => style("RETRYING").yellow().to_string(),
        StepStatus::Success => style("SUCCESS").green().to_string(),
        StepStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// One line summarizing a Run: id, status, started_at, triggered_by.
pub fn format_run_line(run: &Run) -> String {
    let icon = match run.status {
        RunStatus::Success => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Running => SPINNER,
        RunStatus::Pending => INFO,
    };
    format!(
        "{} {} - {} - started {} ({})",
        icon,
        style(&run.id.to_string()[..8]).dim(),
        format_run_status(run.status),
        style(run.started_at.to_rfc3339()).dim(),
        style(&run.triggered_by).cyan(),
    )
}

/// One line per step, for `GetRun` detail output.
pub fn format_step_line(step: &Step) -> String {
    let mut line = format!(
        "  [{}] {} attempt={}",
        format_step_status(step.status),
        style(&step.name).bold(),
        step.attempt_count,
    );
    if let Some(error) = &step.error {
        line.push_str(&format!(" error={}", style(error).red()));
    }
    line
}

/// Full `GetRun` rendering: run header followed by every step.
pub fn format_run_detail(detail: &RunDetail) -> String {
    let mut out = format!(
        "{} {} ({})\n{}\n",
        INFO,
        style(&detail.pipeline.name).bold(),
        style(&detail.run.id.to_string()[..8]).dim(),
        format_run_line(&detail.run),
    );
    for step in &detail.steps {
        out.push_str(&format_step_line(step));
        out.push('\n');
    }
    out
}

/// One line per pipeline, for `ListPipelines` output.
pub fn format_pipeline_summary(summary: &PipelineSummary) -> String {
    format!(
        "  {} ({} runs: {} succeeded, {} failed)",
        style(&summary.name).bold(),
        style(summary.total_runs).cyan(),
        style(summary.succeeded).green(),
        style(summary.failed).red(),
    )
}
