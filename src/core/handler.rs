//! `StepHandler`: the capability a Step Definition carries. The engine
//! always treats its return as a future; synchronous handlers are trivially
//! wrapped by `async fn`.

use async_trait::async_trait;

use super::context::{StepContext, StepResult};

/// One step's executable behavior. Implementations MUST be idempotent: a
/// handler may be re-invoked for the same step after a crash (at-least-once
/// attempt semantics), and the engine does not attempt to disambiguate.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(&self, ctx: &StepContext) -> StepResult;
}
