//! Single-step pipeline whose handler fails a configurable number of times
//! before succeeding. Exercises retry-with-backoff.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::core::context::{StepContext, StepResult};
use crate::core::handler::StepHandler;
use crate::core::pipeline::PipelineDefinition;
use crate::core::step::StepDefinition;

struct FlakyHandler {
    failures_remaining: AtomicU32,
}

#[async_trait]
impl StepHandler for FlakyHandler {
    async fn execute(&self, _ctx: &StepContext) -> StepResult {
        if self.failures_remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
            StepResult::failure("transient failure, retry me")
        } else {
            StepResult::success(json!({"recovered": true}))
        }
    }
}

/// `failures_before_success = 0` always succeeds on the first attempt.
pub fn definition_with(failures_before_success: u32, max_retries: u32) -> PipelineDefinition {
    let handler = FlakyHandler {
        failures_remaining: AtomicU32::new(failures_before_success),
    };
    PipelineDefinition::new("flaky", vec![StepDefinition::new("flaky", Arc::new(handler)).max_retries(max_retries)])
        .expect("flaky pipeline is statically valid")
        .description("single step that fails a fixed number of times before succeeding")
}

pub fn definition() -> PipelineDefinition {
    definition_with(2, 2)
}
