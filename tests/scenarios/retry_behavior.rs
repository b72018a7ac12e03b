//! A step that fails twice then succeeds reaches `success` with
//! `attemptCount = 3`.

use std::sync::Arc;

use pipeline_engine::core::pipeline::PipelineDefinition;
use pipeline_engine::core::state::StepStatus;
use pipeline_engine::core::step::StepDefinition;
use pipeline_engine::execution::execute;
use pipeline_engine::persistence::Store;

use crate::support::{fixture, FailsNTimes};

#[tokio::test]
async fn retries_then_succeeds_on_third_attempt() {
    let fx = fixture();
    let pipeline = fx.store.create_pipeline("flaky", None, None).await.unwrap();
    let (run, _) = fx
        .store
        .create_run_with_steps(pipeline.id, &["flaky".to_string()], "manual")
        .await
        .unwrap();

    let (handler, invocations) = FailsNTimes::new(2);
    let steps = vec![StepDefinition::new("flaky", Arc::new(handler)).max_retries(2)];
    let definition = Arc::new(PipelineDefinition::new("flaky", steps).unwrap());

    let status = execute(fx.store.clone(), &run, definition, Default::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(status, pipeline_engine::core::state::RunStatus::Success);
    assert_eq!(invocations.load(std::sync::atomic::Ordering::SeqCst), 3);

    let steps = fx.store.get_steps_for_run(run.id).await.unwrap();
    let flaky = steps.into_iter().find(|s| s.name == "flaky").unwrap();
    assert_eq!(flaky.status, StepStatus::Success);
    assert_eq!(flaky.attempt_count, 3);
}
