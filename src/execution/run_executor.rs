//! Run Executor: drives a single Run through its planned waves, in normal
//! mode or resume mode.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info};

use crate::core::context::StepResult;
use crate::core::pipeline::PipelineDefinition;
use crate::core::state::RunStatus;
use crate::persistence::{Run, Store};

use super::step_runner::run_step;
use crate::planner::{self, PlanError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),
    #[error("store error: {0}")]
    Store(String),
}

/// Drives `run` to a terminal status using `definition`. `seed_prev_results`
/// is empty in normal mode; in resume mode it holds the deserialized
/// results of every already-successful step, and those steps are skipped —
/// their handlers are never re-invoked.
pub async fn execute(
    store: Arc<dyn Store>,
    run: &Run,
    definition: Arc<PipelineDefinition>,
    metadata: HashMap<String, String>,
    seed_prev_results: HashMap<String, StepResult>,
) -> Result<RunStatus, EngineError> {
    let plan = planner::plan(&definition)?;

    if run.status == RunStatus::Pending {
        store
            .update_run_status(run.id, RunStatus::Running, None)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
    }

    let mut prev_results = seed_prev_results;
    let already_successful: HashSet<String> = prev_results.keys().cloned().collect();

    let start_wave = plan
        .waves
        .iter()
        .position(|wave| wave.iter().any(|name| !already_successful.contains(name)))
        .unwrap_or(plan.waves.len());

    for wave in &plan.waves[start_wave..] {
        let pending_in_wave: Vec<&String> = wave
            .iter()
            .filter(|name| !already_successful.contains(*name))
            .collect();
        if pending_in_wave.is_empty() {
            continue;
        }

        let existing_steps = store
            .get_steps_for_run(run.id)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;

        // Dispatch every pending step of this wave concurrently; wait for
        // all to reach a terminal state before looking at any result, so a
        // sibling failure never orphans an in-flight handler.
        let mut tasks = Vec::with_capacity(pending_in_wave.len());
        for name in pending_in_wave {
            let step_def = definition
                .step(name)
                .expect("planner only emits steps present in the definition")
                .clone();
            let step_row = match existing_steps.iter().find(|s| &s.name == name) {
                Some(existing) => existing.clone(),
                None => store
                    .create_step(run.id, name)
                    .await
                    .map_err(|e| EngineError::Store(e.to_string()))?,
            };

            let store = Arc::clone(&store);
            let prev = prev_results.clone();
            let meta = metadata.clone();
            let run_id = run.id;
            let pipeline_id = run.pipeline_id;
            let name = name.clone();

            tasks.push(tokio::spawn(async move {
                let result = run_step(store.as_ref(), step_row, &step_def, run_id, pipeline_id, prev, meta).await;
                (name, result)
            }));
        }

        let mut wave_failed = false;
        for task in tasks {
            let (name, result) = task.await.map_err(|e| EngineError::Store(format!("step task panicked: {e}")))?;
            match result {
                Ok(step_result) => {
                    prev_results.insert(name, step_result);
                }
                Err(error) => {
                    prev_results.insert(name, StepResult::failure(error));
                    wave_failed = true;
                }
            }
        }

        if wave_failed {
            let now = Utc::now();
            store
                .update_run_status(run.id, RunStatus::Failed, Some(now))
                .await
                .map_err(|e| EngineError::Store(e.to_string()))?;
            error!(run_id = %run.id, "run failed");
            return Ok(RunStatus::Failed);
        }
    }

    let now = Utc::now();
    store
        .update_run_status(run.id, RunStatus::Success, Some(now))
        .await
        .map_err(|e| EngineError::Store(e.to_string()))?;
    info!(run_id = %run.id, "run succeeded");
    Ok(RunStatus::Success)
}
