//! Postgres-backed Store. The claim primitive uses
//! `SELECT ... FOR UPDATE SKIP LOCKED` so contention returns `None` rather
//! than blocking.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::core::state::{RunStatus, StepStatus};

use super::{ClaimedRun, Pipeline, Run, Step, StepStatusUpdate, Store, StoreError};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Idempotent schema bootstrap. Indexes mirror the persisted-state
    /// layout: `runs(status, started_at)` for the FIFO claim, `steps(run_id)`,
    /// and `steps(status, next_retry_at)` for retry scans.
    async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pipelines (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                schedule TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );

            CREATE TABLE IF NOT EXISTS runs (
                id UUID PRIMARY KEY,
                pipeline_id UUID NOT NULL REFERENCES pipelines(id) ON DELETE RESTRICT,
                status TEXT NOT NULL,
                started_at TIMESTAMPTZ NOT NULL,
                finished_at TIMESTAMPTZ,
                triggered_by TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_runs_status_started_at ON runs(status, started_at);

            CREATE TABLE IF NOT EXISTS steps (
                id UUID PRIMARY KEY,
                run_id UUID NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                attempt_count BIGINT NOT NULL DEFAULT 0,
                started_at TIMESTAMPTZ,
                finished_at TIMESTAMPTZ,
                next_retry_at TIMESTAMPTZ,
                result JSONB,
                error TEXT,
                UNIQUE(run_id, name)
            );
            CREATE INDEX IF NOT EXISTS idx_steps_run_id ON steps(run_id);
            CREATE INDEX IF NOT EXISTS idx_steps_status_next_retry_at ON steps(status, next_retry_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to initialize schema")?;

        Ok(())
    }

    fn row_to_run(row: &sqlx::postgres::PgRow) -> Result<Run, StoreError> {
        Ok(Run {
            id: row.try_get("id").map_err(backend)?,
            pipeline_id: row.try_get("pipeline_id").map_err(backend)?,
            status: parse_run_status(&row.try_get::<String, _>("status").map_err(backend)?)?,
            started_at: row.try_get("started_at").map_err(backend)?,
            finished_at: row.try_get("finished_at").map_err(backend)?,
            triggered_by: row.try_get("triggered_by").map_err(backend)?,
        })
    }

    fn row_to_step(row: &sqlx::postgres::PgRow) -> Result<Step, StoreError> {
        Ok(Step {
            id: row.try_get("id").map_err(backend)?,
            run_id: row.try_get("run_id").map_err(backend)?,
            name: row.try_get("name").map_err(backend)?,
            status: parse_step_status(&row.try_get::<String, _>("status").map_err(backend)?)?,
            attempt_count: row.try_get("attempt_count").map_err(backend)?,
            started_at: row.try_get("started_at").map_err(backend)?,
            finished_at: row.try_get("finished_at").map_err(backend)?,
            next_retry_at: row.try_get("next_retry_at").map_err(backend)?,
            result: row.try_get("result").map_err(backend)?,
            error: row.try_get("error").map_err(backend)?,
        })
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(anyhow::Error::new(err))
}

fn run_status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "pending",
        RunStatus::Running => "running",
        RunStatus::Success => "success",
        RunStatus::Failed => "failed",
    }
}

fn parse_run_status(s: &str) -> Result<RunStatus, StoreError> {
    match s {
        "pending" => Ok(RunStatus::Pending),
        "running" => Ok(RunStatus::Running),
        "success" => Ok(RunStatus::Success),
        "failed" => Ok(RunStatus::Failed),
        other => Err(StoreError::Backend(anyhow::anyhow!(
            "unknown run status in database: {other}"
        ))),
    }
}

fn step_status_str(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "pending",
        StepStatus::Running => "running",
        StepStatus::Retrying => "retrying",
        StepStatus::Success => "success",
        StepStatus::Failed => "failed",
    }
}

fn parse_step_status(s: &str) -> Result<StepStatus, StoreError> {
    match s {
        "pending" => Ok(StepStatus::Pending),
        "running" => Ok(StepStatus::Running),
        "retrying" => Ok(StepStatus::Retrying),
        "success" => Ok(StepStatus::Success),
        "failed" => Ok(StepStatus::Failed),
        other => Err(StoreError::Backend(anyhow::anyhow!(
            "unknown step status in database: {other}"
        ))),
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_pipeline(
        &self,
        name: &str,
        description: Option<String>,
        schedule: Option<String>,
    ) -> Result<Pipeline, StoreError> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"
            INSERT INTO pipelines (id, name, description, schedule, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, description, schedule, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(&description)
        .bind(&schedule)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Pipeline {
            id: row.try_get("id").map_err(backend)?,
            name: row.try_get("name").map_err(backend)?,
            description: row.try_get("description").map_err(backend)?,
            schedule: row.try_get("schedule").map_err(backend)?,
            created_at: row.try_get("created_at").map_err(backend)?,
            updated_at: row.try_get("updated_at").map_err(backend)?,
        })
    }

    async fn get_pipeline_by_name(&self, name: &str) -> Result<Option<Pipeline>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, description, schedule, created_at, updated_at FROM pipelines WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|row| {
            Ok(Pipeline {
                id: row.try_get("id").map_err(backend)?,
                name: row.try_get("name").map_err(backend)?,
                description: row.try_get("description").map_err(backend)?,
                schedule: row.try_get("schedule").map_err(backend)?,
                created_at: row.try_get("created_at").map_err(backend)?,
                updated_at: row.try_get("updated_at").map_err(backend)?,
            })
        })
        .transpose()
    }

    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, description, schedule, created_at, updated_at FROM pipelines WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|row| {
            Ok(Pipeline {
                id: row.try_get("id").map_err(backend)?,
                name: row.try_get("name").map_err(backend)?,
                description: row.try_get("description").map_err(backend)?,
                schedule: row.try_get("schedule").map_err(backend)?,
                created_at: row.try_get("created_at").map_err(backend)?,
                updated_at: row.try_get("updated_at").map_err(backend)?,
            })
        })
        .transpose()
    }

    async fn list_pipelines(&self) -> Result<Vec<Pipeline>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, description, schedule, created_at, updated_at FROM pipelines ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                Ok(Pipeline {
                    id: row.try_get("id").map_err(backend)?,
                    name: row.try_get("name").map_err(backend)?,
                    description: row.try_get("description").map_err(backend)?,
                    schedule: row.try_get("schedule").map_err(backend)?,
                    created_at: row.try_get("created_at").map_err(backend)?,
                    updated_at: row.try_get("updated_at").map_err(backend)?,
                })
            })
            .collect()
    }

    async fn create_run_with_steps(
        &self,
        pipeline_id: Uuid,
        step_names: &[String],
        triggered_by: &str,
    ) -> Result<(Run, Vec<Step>), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let now = Utc::now();
        let run_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO runs (id, pipeline_id, status, started_at, finished_at, triggered_by) \
             VALUES ($1, $2, $3, $4, NULL, $5)",
        )
        .bind(run_id)
        .bind(pipeline_id)
        .bind(run_status_str(RunStatus::Pending))
        .bind(now)
        .bind(triggered_by)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        let mut steps = Vec::with_capacity(step_names.len());
        for name in step_names {
            let step_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO steps (id, run_id, name, status, attempt_count) VALUES ($1, $2, $3, $4, 0)",
            )
            .bind(step_id)
            .bind(run_id)
            .bind(name)
            .bind(step_status_str(StepStatus::Pending))
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

            steps.push(Step {
                id: step_id,
                run_id,
                name: name.clone(),
                status: StepStatus::Pending,
                attempt_count: 0,
                started_at: None,
                finished_at: None,
                next_retry_at: None,
                result: None,
                error: None,
            });
        }

        tx.commit().await.map_err(backend)?;

        let run = Run {
            id: run_id,
            pipeline_id,
            status: RunStatus::Pending,
            started_at: now,
            finished_at: None,
            triggered_by: triggered_by.to_string(),
        };
        Ok((run, steps))
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<Run>, StoreError> {
        let row = sqlx::query(
            "SELECT id, pipeline_id, status, started_at, finished_at, triggered_by FROM runs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|row| Self::row_to_run(&row)).transpose()
    }

    async fn list_runs_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Run>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, pipeline_id, status, started_at, finished_at, triggered_by FROM runs \
             WHERE pipeline_id = $1 ORDER BY started_at DESC",
        )
        .bind(pipeline_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(Self::row_to_run).collect()
    }

    async fn update_run_status(
        &self,
        id: Uuid,
        status: RunStatus,
        finished_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE runs SET status = $1, finished_at = COALESCE($2, finished_at) WHERE id = $3")
            .bind(run_status_str(status))
            .bind(finished_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn create_step(&self, run_id: Uuid, name: &str) -> Result<Step, StoreError> {
        let step_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO steps (id, run_id, name, status, attempt_count) VALUES ($1, $2, $3, $4, 0)",
        )
        .bind(step_id)
        .bind(run_id)
        .bind(name)
        .bind(step_status_str(StepStatus::Pending))
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Step {
            id: step_id,
            run_id,
            name: name.to_string(),
            status: StepStatus::Pending,
            attempt_count: 0,
            started_at: None,
            finished_at: None,
            next_retry_at: None,
            result: None,
            error: None,
        })
    }

    async fn get_steps_for_run(&self, run_id: Uuid) -> Result<Vec<Step>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, run_id, name, status, attempt_count, started_at, finished_at, next_retry_at, result, error \
             FROM steps WHERE run_id = $1",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(Self::row_to_step).collect()
    }

    async fn update_step_status(
        &self,
        id: Uuid,
        update: StepStatusUpdate,
    ) -> Result<(), StoreError> {
        let status = update.status.map(step_status_str);
        sqlx::query(
            r#"
            UPDATE steps SET
                status = COALESCE($1, status),
                started_at = COALESCE($2, started_at),
                finished_at = COALESCE($3, finished_at),
                attempt_count = COALESCE($4, attempt_count),
                next_retry_at = $5
            WHERE id = $6
            "#,
        )
        .bind(status)
        .bind(update.started_at)
        .bind(update.finished_at)
        .bind(update.attempt_count)
        .bind(update.next_retry_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn update_step_result(
        &self,
        id: Uuid,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE steps SET result = $1, error = $2 WHERE id = $3")
            .bind(result)
            .bind(error)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get_completed_steps_for_run(
        &self,
        run_id: Uuid,
    ) -> Result<HashMap<String, Step>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, run_id, name, status, attempt_count, started_at, finished_at, next_retry_at, result, error \
             FROM steps WHERE run_id = $1 AND status = $2",
        )
        .bind(run_id)
        .bind(step_status_str(StepStatus::Success))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| Self::row_to_step(row).map(|s| (s.name.clone(), s)))
            .collect()
    }

    /// `DELETE ... WHERE id IN (SELECT ... FOR UPDATE SKIP LOCKED) RETURNING`
    /// is the canonical way to hand one row to exactly one of several
    /// competing claimers without blocking; this adapts that shape to an
    /// `UPDATE` against `runs` directly (no separate outbox table is needed
    /// since the claim target and the claimed row coincide).
    async fn claim_one_pending_run(&self) -> Result<Option<ClaimedRun>, StoreError> {
        let row = sqlx::query(
            r#"
            WITH candidate AS (
                SELECT id FROM runs
                WHERE status = 'pending'
                ORDER BY started_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE runs
            SET status = 'running'
            FROM candidate
            WHERE runs.id = candidate.id
            RETURNING runs.id, runs.pipeline_id, runs.status, runs.started_at, runs.finished_at, runs.triggered_by
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let run = Self::row_to_run(&row)?;
        let pipeline_name = sqlx::query("SELECT name FROM pipelines WHERE id = $1")
            .bind(run.pipeline_id)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?
            .try_get("name")
            .map_err(backend)?;

        Ok(Some(ClaimedRun { run, pipeline_name }))
    }

    async fn find_stuck_running_runs(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Run>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, pipeline_id, status, started_at, finished_at, triggered_by FROM runs \
             WHERE status = 'running' AND started_at < $1",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(Self::row_to_run).collect()
    }
}
