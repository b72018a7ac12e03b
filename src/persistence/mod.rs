//! The Store: a typed, durable repository for Pipelines, Runs, and Steps,
//! with one transactional primitive (`claim_one_pending_run`) and
//! per-entity updates.

pub mod memory_store;
#[cfg(feature = "postgres")]
pub mod postgres_store;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::core::state::{RunStatus, StepStatus};

pub use memory_store::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres_store::PostgresStore;

/// A durable catalog record, created the first time a definition with this
/// name is registered. Never mutated by the engine afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub schedule: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single execution attempt of one Pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub triggered_by: String,
}

/// One step's record for one Run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub id: Uuid,
    pub run_id: Uuid,
    pub name: String,
    pub status: StepStatus,
    pub attempt_count: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Fields that may be updated on a Step by `update_step_status`. Unset
/// fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct StepStatusUpdate {
    pub status: Option<StepStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempt_count: Option<i64>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

/// A Run enriched with its parent Pipeline's name, as returned by the
/// atomic claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedRun {
    pub run: Run,
    pub pipeline_name: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Typed repository for pipelines, runs, and steps. The only operation with
/// non-trivial concurrency semantics is `claim_one_pending_run`; it must be
/// serializable against other concurrent callers (see each impl for how).
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_pipeline(
        &self,
        name: &str,
        description: Option<String>,
        schedule: Option<String>,
    ) -> Result<Pipeline, StoreError>;

    async fn get_pipeline_by_name(&self, name: &str) -> Result<Option<Pipeline>, StoreError>;

    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError>;

    async fn list_pipelines(&self) -> Result<Vec<Pipeline>, StoreError>;

    /// In one transaction: insert a Run (`status=pending`, `startedAt=now`)
    /// and one Step per name (`status=pending`). All-or-nothing.
    async fn create_run_with_steps(
        &self,
        pipeline_id: Uuid,
        step_names: &[String],
        triggered_by: &str,
    ) -> Result<(Run, Vec<Step>), StoreError>;

    async fn get_run(&self, id: Uuid) -> Result<Option<Run>, StoreError>;

    async fn list_runs_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Run>, StoreError>;

    async fn update_run_status(
        &self,
        id: Uuid,
        status: RunStatus,
        finished_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn create_step(&self, run_id: Uuid, name: &str) -> Result<Step, StoreError>;

    async fn get_steps_for_run(&self, run_id: Uuid) -> Result<Vec<Step>, StoreError>;

    async fn update_step_status(
        &self,
        id: Uuid,
        update: StepStatusUpdate,
    ) -> Result<(), StoreError>;

    async fn update_step_result(
        &self,
        id: Uuid,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<(), StoreError>;

    /// Every `success` Step of a Run, for reconstructing `prevResults`.
    async fn get_completed_steps_for_run(
        &self,
        run_id: Uuid,
    ) -> Result<HashMap<String, Step>, StoreError>;

    /// Atomically selects the `pending` Run with the smallest `startedAt`
    /// (FIFO), flips its status to `running`, and returns it enriched with
    /// its parent Pipeline's name. Returns `None` if no pending Run exists.
    /// Must never block indefinitely: contention returns `None` rather than
    /// waits.
    async fn claim_one_pending_run(&self) -> Result<Option<ClaimedRun>, StoreError>;

    /// Runs in `running` whose `startedAt` is older than `older_than`.
    async fn find_stuck_running_runs(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Run>, StoreError>;
}
