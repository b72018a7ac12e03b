//! Three-step pipeline: `greet` → `process` → `finish`, each echoing and
//! transforming the previous step's output. Exercises the prevResults
//! contract end to end.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::core::context::{StepContext, StepResult};
use crate::core::handler::StepHandler;
use crate::core::pipeline::PipelineDefinition;
use crate::core::step::StepDefinition;

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
        let Some(greet) = ctx.prev_results.get("greet") else {
            return StepResult::failure("missing prevResults.greet");
        };
        let Some(message) = greet.data.as_ref().and_then(|d| d.get("m")).and_then(|m| m.as_str()) else {
            return StepResult::failure("prevResults.greet.data.m is not a string");
        };
        StepResult::success(json!({"u": message.to_uppercase()}))
    }
}

struct Finish;

#[async_trait]
impl StepHandler for Finish {
    async fn execute(&self, ctx: &StepContext) -> StepResult {
        let Some(process) = ctx.prev_results.get("process") else {
            return StepResult::failure("missing prevResults.process");
        };
        let Some(upper) = process.data.as_ref().and_then(|d| d.get("u")).cloned() else {
            return StepResult::failure("prevResults.process.data.u is missing");
        };
        StepResult::success(json!({"f": upper}))
    }
}

pub fn definition() -> PipelineDefinition {
    PipelineDefinition::new(
        "echo",
        vec![
            StepDefinition::new("greet", Arc::new(Greet)),
            StepDefinition::new("process", Arc::new(Process)),
            StepDefinition::new("finish", Arc::new(Finish)),
        ],
    )
    .expect("echo pipeline is statically valid")
    .description("three-step echo/transform demonstration")
}
