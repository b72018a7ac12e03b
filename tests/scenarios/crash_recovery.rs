//! The Recovery Orchestrator finds a Run stuck `running` past its
//! staleness threshold and resumes it without re-invoking the handlers of
//! already-successful steps; a stuck Run with a failed step is marked
//! `failed` instead, and no handler runs at all.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use pipeline_engine::core::pipeline::PipelineDefinition;
use pipeline_engine::core::registry::Registry;
use pipeline_engine::core::state::{RunStatus, StepStatus};
use pipeline_engine::core::step::StepDefinition;
use pipeline_engine::execution::RecoveryOrchestrator;
use pipeline_engine::persistence::{Store, StepStatusUpdate};

use crate::support::{fixture, CountingHandler};

/// Step one and two are already `success`; step three is still `pending`.
/// Recovery must resume from step three only, and the Run ends `success`.
#[tokio::test]
async fn resumes_a_stuck_run_from_its_first_unfinished_step() {
    let fx = fixture();
    let pipeline = fx.store.create_pipeline("three-steps", None, None).await.unwrap();
    let (run, steps) = fx
        .store
        .create_run_with_steps(pipeline.id, &["one".to_string(), "two".to_string(), "three".to_string()], "manual")
        .await
        .unwrap();

    let one = steps.iter().find(|s| s.name == "one").unwrap();
    let two = steps.iter().find(|s| s.name == "two").unwrap();

    for step in [one, two] {
        fx.store
            .update_step_status(
                step.id,
                StepStatusUpdate {
                    status: Some(StepStatus::Success),
                    finished_at: Some(Utc::now()),
                    attempt_count: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        fx.store
            .update_step_result(step.id, Some(serde_json::json!({"done": step.name})), None)
            .await
            .unwrap();
    }
    fx.store.update_run_status(run.id, RunStatus::Running, None).await.unwrap();

    let one_calls = Arc::new(AtomicU32::new(0));
    let two_calls = Arc::new(AtomicU32::new(0));
    let three_calls = Arc::new(AtomicU32::new(0));

    let registry = Registry::new();
    let definition = PipelineDefinition::new(
        "three-steps",
        vec![
            StepDefinition::new(
                "one",
                Arc::new(CountingHandler {
                    calls: Arc::clone(&one_calls),
                    result: serde_json::json!({}),
                }),
            ),
            StepDefinition::new(
                "two",
                Arc::new(CountingHandler {
                    calls: Arc::clone(&two_calls),
                    result: serde_json::json!({}),
                }),
            ),
            StepDefinition::new(
                "three",
                Arc::new(CountingHandler {
                    calls: Arc::clone(&three_calls),
                    result: serde_json::json!({"finished": true}),
                }),
            ),
        ],
    )
    .unwrap();
    registry.register(definition).unwrap();

    // A threshold small enough that the run (seeded moments ago) already
    // qualifies as stuck.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let store_dyn: Arc<dyn Store> = fx.store.clone();
    let orchestrator = RecoveryOrchestrator::new(store_dyn, Arc::new(registry), Duration::from_millis(1));
    orchestrator.scan().await;

    assert_eq!(one_calls.load(Ordering::SeqCst), 0, "already-successful step must not re-run");
    assert_eq!(two_calls.load(Ordering::SeqCst), 0, "already-successful step must not re-run");
    assert_eq!(three_calls.load(Ordering::SeqCst), 1, "unfinished step must run exactly once");

    let run = fx.store.get_run(run.id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Success);
}

/// Step one is already `failed`. Recovery must refuse to resume past a
/// terminally failed step: it marks the Run `failed` and never invokes any
/// handler, including step three's.
#[tokio::test]
async fn refuses_to_resume_past_a_failed_step() {
    let fx = fixture();
    let pipeline = fx.store.create_pipeline("doomed-chain", None, None).await.unwrap();
    let (run, steps) = fx
        .store
        .create_run_with_steps(pipeline.id, &["one".to_string(), "two".to_string()], "manual")
        .await
        .unwrap();

    let one = steps.iter().find(|s| s.name == "one").unwrap();
    fx.store
        .update_step_status(
            one.id,
            StepStatusUpdate {
                status: Some(StepStatus::Failed),
                finished_at: Some(Utc::now()),
                attempt_count: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    fx.store.update_step_result(one.id, None, Some("boom".to_string())).await.unwrap();
    fx.store.update_run_status(run.id, RunStatus::Running, None).await.unwrap();

    let two_calls = Arc::new(AtomicU32::new(0));
    let registry = Registry::new();
    let definition = PipelineDefinition::new(
        "doomed-chain",
        vec![
            StepDefinition::new("one", Arc::new(CountingHandler {
                calls: Arc::new(AtomicU32::new(0)),
                result: serde_json::json!({}),
            })),
            StepDefinition::new(
                "two",
                Arc::new(CountingHandler {
                    calls: Arc::clone(&two_calls),
                    result: serde_json::json!({}),
                }),
            ),
        ],
    )
    .unwrap();
    registry.register(definition).unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let store_dyn: Arc<dyn Store> = fx.store.clone();
    let orchestrator = RecoveryOrchestrator::new(store_dyn, Arc::new(registry), Duration::from_millis(1));
    orchestrator.scan().await;

    assert_eq!(two_calls.load(Ordering::SeqCst), 0, "must never run past a failed step");

    let run = fx.store.get_run(run.id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}
