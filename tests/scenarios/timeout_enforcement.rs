//! A step whose handler runs longer than its declared `timeoutMs` is
//! treated as a retryable failure; with no retry budget left it fails the
//! Run on the first attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use pipeline_engine::core::context::{StepContext, StepResult};
use pipeline_engine::core::handler::StepHandler;
use pipeline_engine::core::pipeline::PipelineDefinition;
use pipeline_engine::core::state::{RunStatus, StepStatus};
use pipeline_engine::core::step::StepDefinition;
use pipeline_engine::execution::execute;
use pipeline_engine::persistence::Store;

use crate::support::fixture;

struct NeverFinishes;

#[async_trait]
impl StepHandler for NeverFinishes {
    async fn execute(&self, _ctx: &StepContext) -> StepResult {
        tokio::time::sleep(Duration::from_secs(5)).await;
        StepResult::success(serde_json::json!({}))
    }
}

#[tokio::test]
async fn timeout_fails_the_step_and_the_run() {
    let fx = fixture();
    let pipeline = fx.store.create_pipeline("slow", None, None).await.unwrap();
    let (run, _) = fx
        .store
        .create_run_with_steps(pipeline.id, &["slow".to_string()], "manual")
        .await
        .unwrap();

    let steps = vec![StepDefinition::new("slow", Arc::new(NeverFinishes)).timeout_ms(50).max_retries(0)];
    let definition = Arc::new(PipelineDefinition::new("slow", steps).unwrap());

    let status = execute(fx.store.clone(), &run, definition, Default::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(status, RunStatus::Failed);

    let steps = fx.store.get_steps_for_run(run.id).await.unwrap();
    let slow = steps.into_iter().find(|s| s.name == "slow").unwrap();
    assert_eq!(slow.status, StepStatus::Failed);
    assert_eq!(slow.attempt_count, 1);
    assert!(slow.error.as_deref().unwrap_or_default().contains("timeout"));
}
