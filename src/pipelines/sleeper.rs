//! Two-step pipeline with no declared dependencies between its steps:
//! `alpha` and `beta` each sleep, then a `merge` step depends on both.
//! Exercises wave-level parallelism.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::core::context::{StepContext, StepResult};
use crate::core::handler::StepHandler;
use crate::core::pipeline::PipelineDefinition;
use crate::core::step::StepDefinition;

struct Gen;

#[async_trait]
impl StepHandler for Gen {
    async fn execute(&self, _ctx: &StepContext) -> StepResult {
        StepResult::success(json!({"seed": 1}))
    }
}

struct Sleep {
    millis: u64,
}

#[async_trait]
impl StepHandler for Sleep {
    async fn execute(&self, _ctx: &StepContext) -> StepResult {
        tokio::time::sleep(Duration::from_millis(self.millis)).await;
        StepResult::success(json!({"slept_ms": self.millis}))
    }
}

struct Merge;

#[async_trait]
impl StepHandler for Merge {
    async fn execute(&self, ctx: &StepContext) -> StepResult {
        let alpha = ctx.prev_results.get("alpha").is_some();
        let beta = ctx.prev_results.get("beta").is_some();
        StepResult::success(json!({"merged": alpha && beta}))
    }
}

pub fn definition() -> PipelineDefinition {
    PipelineDefinition::new(
        "sleeper",
        vec![
            StepDefinition::new("gen", Arc::new(Gen)),
            StepDefinition::new("alpha", Arc::new(Sleep { millis: 2000 })).depends_on(vec!["gen".to_string()]),
            StepDefinition::new("beta", Arc::new(Sleep { millis: 3000 })).depends_on(vec!["gen".to_string()]),
            StepDefinition::new("merge", Arc::new(Merge))
                .depends_on(vec!["alpha".to_string(), "beta".to_string()]),
        ],
    )
    .expect("sleeper pipeline is statically valid")
    .description("demonstrates wave-level parallelism: alpha and beta run concurrently after gen")
}
