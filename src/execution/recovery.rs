//! Recovery Orchestrator: finds Runs stuck `running` past a staleness
//! threshold and resumes them from their first non-successful step.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::core::context::StepResult;
use crate::core::registry::Registry;
use crate::core::state::{RunStatus, StepStatus};
use crate::persistence::Store;

use super::run_executor;

pub struct RecoveryOrchestrator {
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
    staleness_threshold: chrono::Duration,
}

impl RecoveryOrchestrator {
    pub fn new(store: Arc<dyn Store>, registry: Arc<Registry>, staleness_threshold: std::time::Duration) -> Self {
        Self {
            store,
            registry,
            staleness_threshold: chrono::Duration::from_std(staleness_threshold)
                .unwrap_or_else(|_| chrono::Duration::minutes(10)),
        }
    }

    /// One scan pass. Call once at startup, then on a timer.
    pub async fn scan(&self) {
        let older_than = Utc::now() - self.staleness_threshold;
        let stuck = match self.store.find_stuck_running_runs(older_than).await {
            Ok(runs) => runs,
            Err(error) => {
                error!(%error, "recovery scan failed to list stuck runs");
                return;
            }
        };

        for run in stuck {
            self.recover_one(run).await;
        }
    }

    async fn recover_one(&self, run: crate::persistence::Run) {
        let steps = match self.store.get_steps_for_run(run.id).await {
            Ok(steps) => steps,
            Err(error) => {
                error!(run_id = %run.id, %error, "recovery failed to load steps");
                return;
            }
        };

        if steps.iter().any(|s| s.status == StepStatus::Failed) {
            warn!(run_id = %run.id, "cannot auto-resume; has failed steps");
            if let Err(error) = self
                .store
                .update_run_status(run.id, RunStatus::Failed, Some(Utc::now()))
                .await
            {
                error!(run_id = %run.id, %error, "failed to mark run failed during recovery");
            }
            return;
        }

        let mut prev_results = HashMap::new();
        for step in steps.iter().filter(|s| s.status == StepStatus::Success) {
            let data = step.result.clone().unwrap_or(serde_json::Value::Null);
            prev_results.insert(step.name.clone(), StepResult::success(data));
        }

        let pipeline = match self.store.get_pipeline(run.pipeline_id).await {
            Ok(Some(pipeline)) => pipeline,
            Ok(None) => {
                warn!(run_id = %run.id, "recovery: pipeline row missing, leaving run running");
                return;
            }
            Err(error) => {
                error!(run_id = %run.id, %error, "recovery failed to load pipeline");
                return;
            }
        };

        let definition = match self.registry.get(&pipeline.name) {
            Ok(definition) => definition,
            Err(error) => {
                warn!(run_id = %run.id, pipeline = %pipeline.name, %error, "recovery: pipeline not in registry, leaving run running");
                return;
            }
        };

        info!(run_id = %run.id, pipeline = %pipeline.name, "resuming stuck run");
        match run_executor::execute(Arc::clone(&self.store), &run, definition, HashMap::new(), prev_results).await {
            Ok(status) => info!(run_id = %run.id, %status, "recovery finished"),
            Err(error) => error!(run_id = %run.id, %error, "recovery's run executor failed"),
        }
    }
}
