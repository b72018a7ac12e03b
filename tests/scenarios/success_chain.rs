//! Simple 3-step success chain threading `prevResults` through each
//! handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use pipeline_engine::core::context::{StepContext, StepResult};
use pipeline_engine::core::handler::StepHandler;
use pipeline_engine::core::pipeline::PipelineDefinition;
use pipeline_engine::core::state::RunStatus;
use pipeline_engine::core::step::StepDefinition;
use pipeline_engine::execution::execute;
use pipeline_engine::persistence::Store;

use crate::support::fixture;

struct Greet;

#[async_trait]
impl StepHandler for Greet {
    async fn execute(&self, _ctx: &StepContext) -> StepResult {
        StepResult::success(json!({"m": "Hello"}))
    }
}

struct Process;

#[async_trait]
impl StepHandler for Process {
    async fn execute(&self, ctx: &StepContext) -> StepResult {
        let m = ctx.prev_results["greet"].data.as_ref().unwrap()["m"].as_str().unwrap();
        StepResult::success(json!({"u": m.to_uppercase()}))
    }
}

struct Finish;

#[async_trait]
impl StepHandler for Finish {
    async fn execute(&self, ctx: &StepContext) -> StepResult {
        let u = ctx.prev_results["process"].data.as_ref().unwrap()["u"].clone();
        StepResult::success(json!({"f": u}))
    }
}

#[tokio::test]
async fn three_step_chain_threads_prev_results() {
    let fx = fixture();
    let pipeline = fx.store.create_pipeline("chain", None, None).await.unwrap();
    let (run, _) = fx
        .store
        .create_run_with_steps(pipeline.id, &["greet".to_string(), "process".to_string(), "finish".to_string()], "manual")
        .await
        .unwrap();

    let definition = Arc::new(
        PipelineDefinition::new(
            "chain",
            vec![
                StepDefinition::new("greet", Arc::new(Greet)),
                StepDefinition::new("process", Arc::new(Process)),
                StepDefinition::new("finish", Arc::new(Finish)),
            ],
        )
        .unwrap(),
    );

    let status = execute(fx.store.clone(), &run, definition, Default::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(status, RunStatus::Success);

    let steps = fx.store.get_steps_for_run(run.id).await.unwrap();
    assert_eq!(steps.len(), 3);
    assert!(steps.iter().all(|s| s.status == pipeline_engine::core::state::StepStatus::Success));

    let finish = steps.iter().find(|s| s.name == "finish").unwrap();
    assert_eq!(finish.result, Some(json!({"f": "HELLO"})));
}
