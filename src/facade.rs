//! The four operations an HTTP/RPC façade (out of scope for this crate)
//! would call: `TriggerRun`, `ListPipelines`, `GetRun`, `RetryRun`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::core::registry::Registry;
use crate::core::state::RunStatus;
use crate::persistence::{Pipeline, Run, Step, Store, StoreError};

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error("pipeline not found: {0}")]
    PipelineNotFound(String),
    #[error("run not found: {0}")]
    RunNotFound(Uuid),
    #[error("run {0} is not in a terminal failed state")]
    RunNotRetryable(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Serialize)]
pub struct PipelineSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub total_runs: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct RunDetail {
    pub run: Run,
    pub steps: Vec<Step>,
    pub pipeline: Pipeline,
}

/// Holds what every façade operation needs: a Store and a Registry. Cloneable
/// by reference (both fields are `Arc`), so one instance is shared across a
/// web framework's request handlers.
#[derive(Clone)]
pub struct Facade {
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
}

impl Facade {
    pub fn new(store: Arc<dyn Store>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }

    pub async fn trigger_run(
        &self,
        pipeline_name: &str,
        triggered_by: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<Uuid, FacadeError> {
        let definition = self
            .registry
            .get(pipeline_name)
            .map_err(|_| FacadeError::PipelineNotFound(pipeline_name.to_string()))?;

        let pipeline = self
            .store
            .create_pipeline(pipeline_name, definition.description.clone(), definition.schedule.clone())
            .await?;

        let step_names: Vec<String> = definition.steps.iter().map(|s| s.name.clone()).collect();
        let (run, _steps) = self
            .store
            .create_run_with_steps(pipeline.id, &step_names, triggered_by)
            .await?;

        Ok(run.id)
    }

    pub async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>, FacadeError> {
        let pipelines = self.store.list_pipelines().await?;
        let mut summaries = Vec::with_capacity(pipelines.len());
        for pipeline in pipelines {
            let runs = self.store.list_runs_by_pipeline(pipeline.id).await?;
            let succeeded = runs.iter().filter(|r| r.status == RunStatus::Success).count();
            let failed = runs.iter().filter(|r| r.status == RunStatus::Failed).count();
            summaries.push(PipelineSummary {
                id: pipeline.id,
                name: pipeline.name,
                description: pipeline.description,
                total_runs: runs.len(),
                succeeded,
                failed,
            });
        }
        Ok(summaries)
    }

    pub async fn get_run(&self, run_id: Uuid) -> Result<RunDetail, FacadeError> {
        let run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or(FacadeError::RunNotFound(run_id))?;
        let steps = self.store.get_steps_for_run(run_id).await?;
        let pipeline = self
            .store
            .get_pipeline(run.pipeline_id)
            .await?
            .ok_or(FacadeError::RunNotFound(run_id))?;
        Ok(RunDetail { run, steps, pipeline })
    }

    pub async fn retry_run(&self, run_id: Uuid) -> Result<Uuid, FacadeError> {
        let run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or(FacadeError::RunNotFound(run_id))?;
        if run.status != RunStatus::Failed {
            return Err(FacadeError::RunNotRetryable(run_id));
        }

        let pipeline = self
            .store
            .get_pipeline(run.pipeline_id)
            .await?
            .ok_or(FacadeError::RunNotFound(run_id))?;
        let definition = self
            .registry
            .get(&pipeline.name)
            .map_err(|_| FacadeError::PipelineNotFound(pipeline.name.clone()))?;
        let step_names: Vec<String> = definition.steps.iter().map(|s| s.name.clone()).collect();

        let (new_run, _steps) = self
            .store
            .create_run_with_steps(pipeline.id, &step_names, "manual_retry")
            .await?;
        Ok(new_run.id)
    }
}
