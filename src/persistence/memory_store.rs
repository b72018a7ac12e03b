//! Single-process Store, for tests and single-process operation. Claims are
//! serialized on a `tokio::sync::Mutex`, satisfying the atomicity invariant
//! (at most one caller is ever awarded a given pending Run) but not
//! `PostgresStore`'s cross-process guarantee.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::state::{RunStatus, StepStatus};

use super::{ClaimedRun, Pipeline, Run, Step, StepStatusUpdate, Store, StoreError};

#[derive(Default)]
struct Tables {
    pipelines: HashMap<Uuid, Pipeline>,
    runs: HashMap<Uuid, Run>,
    steps: HashMap<Uuid, Step>,
}

pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_pipeline(
        &self,
        name: &str,
        description: Option<String>,
        schedule: Option<String>,
    ) -> Result<Pipeline, StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.pipelines.values().find(|p| p.name == name) {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let pipeline = Pipeline {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description,
            schedule,
            created_at: now,
            updated_at: now,
        };
        tables.pipelines.insert(pipeline.id, pipeline.clone());
        Ok(pipeline)
    }

    async fn get_pipeline_by_name(&self, name: &str) -> Result<Option<Pipeline>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.pipelines.values().find(|p| p.name == name).cloned())
    }

    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.pipelines.get(&id).cloned())
    }

    async fn list_pipelines(&self) -> Result<Vec<Pipeline>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.pipelines.values().cloned().collect())
    }

    async fn create_run_with_steps(
        &self,
        pipeline_id: Uuid,
        step_names: &[String],
        triggered_by: &str,
    ) -> Result<(Run, Vec<Step>), StoreError> {
        let mut tables = self.tables.lock().await;
        let run = Run {
            id: Uuid::new_v4(),
            pipeline_id,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            triggered_by: triggered_by.to_string(),
        };
        let steps: Vec<Step> = step_names
            .iter()
            .map(|name| Step {
                id: Uuid::new_v4(),
                run_id: run.id,
                name: name.clone(),
                status: StepStatus::Pending,
                attempt_count: 0,
                started_at: None,
                finished_at: None,
                next_retry_at: None,
                result: None,
                error: None,
            })
            .collect();

        tables.runs.insert(run.id, run.clone());
        for step in &steps {
            tables.steps.insert(step.id, step.clone());
        }
        Ok((run, steps))
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<Run>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.runs.get(&id).cloned())
    }

    async fn list_runs_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Run>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .runs
            .values()
            .filter(|r| r.pipeline_id == pipeline_id)
            .cloned()
            .collect())
    }

    async fn update_run_status(
        &self,
        id: Uuid,
        status: RunStatus,
        finished_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let run = tables
            .runs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("run {id}")))?;
        run.status = status;
        if finished_at.is_some() {
            run.finished_at = finished_at;
        }
        Ok(())
    }

    async fn create_step(&self, run_id: Uuid, name: &str) -> Result<Step, StoreError> {
        let mut tables = self.tables.lock().await;
        let step = Step {
            id: Uuid::new_v4(),
            run_id,
            name: name.to_string(),
            status: StepStatus::Pending,
            attempt_count: 0,
            started_at: None,
            finished_at: None,
            next_retry_at: None,
            result: None,
            error: None,
        };
        tables.steps.insert(step.id, step.clone());
        Ok(step)
    }

    async fn get_steps_for_run(&self, run_id: Uuid) -> Result<Vec<Step>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .steps
            .values()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn update_step_status(
        &self,
        id: Uuid,
        update: StepStatusUpdate,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let step = tables
            .steps
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("step {id}")))?;
        if let Some(status) = update.status {
            step.status = status;
        }
        if update.started_at.is_some() {
            step.started_at = update.started_at;
        }
        if update.finished_at.is_some() {
            step.finished_at = update.finished_at;
        }
        if let Some(attempt_count) = update.attempt_count {
            step.attempt_count = attempt_count;
        }
        // next_retry_at is explicitly reset to None when leaving `retrying`,
        // so always apply it (not just when `is_some`).
        step.next_retry_at = update.next_retry_at;
        Ok(())
    }

    async fn update_step_result(
        &self,
        id: Uuid,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let step = tables
            .steps
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("step {id}")))?;
        step.result = result;
        step.error = error;
        Ok(())
    }

    async fn get_completed_steps_for_run(
        &self,
        run_id: Uuid,
    ) -> Result<HashMap<String, Step>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .steps
            .values()
            .filter(|s| s.run_id == run_id && s.status == StepStatus::Success)
            .map(|s| (s.name.clone(), s.clone()))
            .collect())
    }

    async fn claim_one_pending_run(&self) -> Result<Option<ClaimedRun>, StoreError> {
        let mut tables = self.tables.lock().await;
        let candidate = tables
            .runs
            .values()
            .filter(|r| r.status == RunStatus::Pending)
            .min_by_key(|r| r.started_at)
            .map(|r| r.id);

        let Some(run_id) = candidate else {
            return Ok(None);
        };

        let pipeline_name = {
            let run = &tables.runs[&run_id];
            tables
                .pipelines
                .get(&run.pipeline_id)
                .map(|p| p.name.clone())
                .ok_or_else(|| StoreError::NotFound(format!("pipeline {}", run.pipeline_id)))?
        };

        let run = tables.runs.get_mut(&run_id).expect("checked above");
        run.status = RunStatus::Running;
        let run = run.clone();

        Ok(Some(ClaimedRun { run, pipeline_name }))
    }

    async fn find_stuck_running_runs(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Run>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .runs
            .values()
            .filter(|r| r.status == RunStatus::Running && r.started_at < older_than)
            .cloned()
            .collect())
    }
}
