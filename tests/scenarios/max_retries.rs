//! A step that fails on every attempt exhausts `maxRetries` and the Run
//! ends `failed`.

use std::sync::Arc;

use pipeline_engine::core::pipeline::PipelineDefinition;
use pipeline_engine::core::state::{RunStatus, StepStatus};
use pipeline_engine::core::step::StepDefinition;
use pipeline_engine::execution::execute;
use pipeline_engine::persistence::Store;

use crate::support::{fixture, AlwaysFails, FailsNTimes};

#[tokio::test]
async fn exhausts_retries_and_fails_the_run() {
    let fx = fixture();
    let pipeline = fx.store.create_pipeline("doomed", None, None).await.unwrap();
    let (run, _) = fx
        .store
        .create_run_with_steps(pipeline.id, &["doomed".to_string()], "manual")
        .await
        .unwrap();

    let steps = vec![StepDefinition::new("doomed", Arc::new(AlwaysFails("nope"))).max_retries(2)];
    let definition = Arc::new(PipelineDefinition::new("doomed", steps).unwrap());

    let status = execute(fx.store.clone(), &run, definition, Default::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(status, RunStatus::Failed);

    let steps = fx.store.get_steps_for_run(run.id).await.unwrap();
    let doomed = steps.into_iter().find(|s| s.name == "doomed").unwrap();
    assert_eq!(doomed.status, StepStatus::Failed);
    // initial attempt + 2 retries
    assert_eq!(doomed.attempt_count, 3);
    assert_eq!(doomed.error.as_deref(), Some("nope"));
}

#[tokio::test]
async fn zero_max_retries_fails_on_first_attempt() {
    let fx = fixture();
    let pipeline = fx.store.create_pipeline("doomed2", None, None).await.unwrap();
    let (run, _) = fx
        .store
        .create_run_with_steps(pipeline.id, &["doomed2".to_string()], "manual")
        .await
        .unwrap();

    // `remaining` far larger than any retry budget: it never reaches
    // success, so this behaves like AlwaysFails while also counting calls.
    let (handler, invocations) = FailsNTimes::new(1000);
    let steps = vec![StepDefinition::new("doomed2", Arc::new(handler))];
    let definition = Arc::new(PipelineDefinition::new("doomed2", steps).unwrap());

    let status = execute(fx.store.clone(), &run, definition, Default::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(status, RunStatus::Failed);
    assert_eq!(invocations.load(std::sync::atomic::Ordering::SeqCst), 1);

    let steps = fx.store.get_steps_for_run(run.id).await.unwrap();
    let doomed = steps.into_iter().find(|s| s.name == "doomed2").unwrap();
    assert_eq!(doomed.status, StepStatus::Failed);
    assert_eq!(doomed.attempt_count, 1);
}
