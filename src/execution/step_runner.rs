//! Step Runner: runs one Step to a terminal state within the context of a
//! single Run, enforcing timeout and retry-with-backoff.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::context::{StepContext, StepResult};
use crate::core::state::StepStatus;
use crate::core::step::StepDefinition;
use crate::persistence::{Step, StepStatusUpdate, Store};

use super::backoff::default_backoff;

/// Runs one Step to completion (success or terminal failure), writing every
/// state change to the Store before the next action.
pub async fn run_step(
    store: &dyn Store,
    step_row: Step,
    definition: &StepDefinition,
    run_id: Uuid,
    pipeline_id: Uuid,
    prev_results: HashMap<String, StepResult>,
    metadata: HashMap<String, String>,
) -> Result<StepResult, String> {
    let step_id = step_row.id;
    let mut attempt_count: i64 = step_row.attempt_count;

    loop {
        attempt_count += 1;
        store
            .update_step_status(
                step_id,
                StepStatusUpdate {
                    status: Some(StepStatus::Running),
                    // Only the very first attempt sets startedAt; a retry
                    // (or a resumed step that already had attempts before a
                    // crash) must not overwrite the original start time.
                    started_at: if attempt_count == 1 { Some(Utc::now()) } else { None },
                    attempt_count: Some(attempt_count),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| e.to_string())?;

        let ctx = StepContext {
            run_id,
            pipeline_id,
            prev_results: prev_results.clone(),
            metadata: metadata.clone(),
        };

        let attempt = invoke_with_timeout(definition, &ctx).await;

        match attempt {
            Attempt::Success(data) => {
                let now = Utc::now();
                store
                    .update_step_status(
                        step_id,
                        StepStatusUpdate {
                            status: Some(StepStatus::Success),
                            finished_at: Some(now),
                            ..Default::default()
                        },
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                store
                    .update_step_result(step_id, Some(data.clone()), None)
                    .await
                    .map_err(|e| e.to_string())?;
                info!(step = %definition.name, %run_id, "step succeeded");
                return Ok(StepResult::success(data));
            }
            Attempt::Retryable(error) => {
                let max_attempts = 1 + definition.max_retries as i64;
                if attempt_count < max_attempts {
                    let next_retry_at =
                        Utc::now() + chrono::Duration::from_std(default_backoff(attempt_count as u32)).unwrap();
                    store
                        .update_step_status(
                            step_id,
                            StepStatusUpdate {
                                status: Some(StepStatus::Retrying),
                                next_retry_at: Some(next_retry_at),
                                ..Default::default()
                            },
                        )
                        .await
                        .map_err(|e| e.to_string())?;
                    store
                        .update_step_result(step_id, None, Some(error.clone()))
                        .await
                        .map_err(|e| e.to_string())?;
                    warn!(step = %definition.name, %run_id, attempt = attempt_count, %error, "step retrying");

                    let sleep_for = (next_retry_at - Utc::now())
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    tokio::time::sleep(sleep_for).await;
                    continue;
                }

                let now = Utc::now();
                store
                    .update_step_status(
                        step_id,
                        StepStatusUpdate {
                            status: Some(StepStatus::Failed),
                            finished_at: Some(now),
                            ..Default::default()
                        },
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                store
                    .update_step_result(step_id, None, Some(error.clone()))
                    .await
                    .map_err(|e| e.to_string())?;
                warn!(step = %definition.name, %run_id, attempt = attempt_count, %error, "step failed, retries exhausted");
                return Err(error);
            }
        }
    }
}

enum Attempt {
    Success(serde_json::Value),
    Retryable(String),
}

/// Races the handler against the step's declared timeout (if any). The
/// handler runs on its own task so a panic is caught via `JoinHandle`
/// unwinding rather than taking down the wave's `tokio::spawn` in
/// `run_executor`; on timeout the task is aborted and its eventual result
/// (success or not) is discarded, matching the "never record a result
/// produced after the deadline" rule.
async fn invoke_with_timeout(definition: &StepDefinition, ctx: &StepContext) -> Attempt {
    let handler = Arc::clone(&definition.handler);
    let ctx_owned = ctx.clone();

    let handle = tokio::spawn(async move { handler.execute(&ctx_owned).await });

    let joined = match definition.timeout_ms {
        None => handle.await,
        Some(timeout_ms) => {
            let abort_handle = handle.abort_handle();
            match tokio::time::timeout(Duration::from_millis(timeout_ms), handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    abort_handle.abort();
                    return Attempt::Retryable(format!("timeout after {timeout_ms}ms"));
                }
            }
        }
    };

    match joined {
        Ok(result) => {
            if result.success {
                match result.data {
                    Some(data) => Attempt::Success(data),
                    None => Attempt::Retryable("handler reported success with no data".to_string()),
                }
            } else {
                Attempt::Retryable(result.error.unwrap_or_else(|| "handler reported failure".to_string()))
            }
        }
        Err(join_error) => Attempt::Retryable(panic_message(join_error)),
    }
}

/// Extracts a human-readable message from a handler task that panicked or
/// was cancelled, for use as the Step's `error` field.
fn panic_message(err: tokio::task::JoinError) -> String {
    if err.is_cancelled() {
        return "step handler was cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "step handler panicked".to_string()
    }
}
