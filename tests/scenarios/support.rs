//! Shared test fixtures: small mock handlers and store/registry wiring used
//! across every scenario file.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use pipeline_engine::core::context::{StepContext, StepResult};
use pipeline_engine::core::handler::StepHandler;
use pipeline_engine::core::pipeline::PipelineDefinition;
use pipeline_engine::core::registry::Registry;
use pipeline_engine::core::step::StepDefinition;
use pipeline_engine::facade::Facade;
use pipeline_engine::persistence::{InMemoryStore, Store};

/// A handler that always succeeds with a fixed payload.
pub struct Fixed(pub Value);

#[async_trait]
impl StepHandler for Fixed {
    async fn execute(&self, _ctx: &StepContext) -> StepResult {
        StepResult::success(self.0.clone())
    }
}

/// A handler that always fails with a fixed message.
pub struct AlwaysFails(pub &'static str);

#[async_trait]
impl StepHandler for AlwaysFails {
    async fn execute(&self, _ctx: &StepContext) -> StepResult {
        StepResult::failure(self.0)
    }
}

/// A handler that fails `n` times then succeeds, counting its invocations.
pub struct FailsNTimes {
    pub remaining: AtomicU32,
    pub invocations: Arc<AtomicU32>,
}

impl FailsNTimes {
    pub fn new(remaining: u32) -> (Self, Arc<AtomicU32>) {
        let invocations = Arc::new(AtomicU32::new(0));
        (
            Self {
                remaining: AtomicU32::new(remaining),
                invocations: Arc::clone(&invocations),
            },
            invocations,
        )
    }
}

#[async_trait]
impl StepHandler for FailsNTimes {
    async fn execute(&self, _ctx: &StepContext) -> StepResult {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if self.remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
            StepResult::failure("not yet")
        } else {
            StepResult::success(json!({"recovered": true}))
        }
    }
}

/// A handler that sleeps for `millis` before succeeding.
pub struct Sleeper {
    pub millis: u64,
}

#[async_trait]
impl StepHandler for Sleeper {
    async fn execute(&self, _ctx: &StepContext) -> StepResult {
        tokio::time::sleep(Duration::from_millis(self.millis)).await;
        StepResult::success(json!({}))
    }
}

/// A handler that counts its invocations without doing anything else;
/// used to assert that recovery never re-invokes an already-successful
/// step's handler.
pub struct CountingHandler {
    pub calls: Arc<AtomicU32>,
    pub result: Value,
}

#[async_trait]
impl StepHandler for CountingHandler {
    async fn execute(&self, _ctx: &StepContext) -> StepResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StepResult::success(self.result.clone())
    }
}

pub fn single_step(name: &str, handler: Arc<dyn StepHandler>) -> PipelineDefinition {
    PipelineDefinition::new(name, vec![StepDefinition::new(name, handler)]).unwrap()
}

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub registry: Arc<Registry>,
    pub facade: Facade,
}

pub fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let registry = Arc::new(Registry::new());
    let store_dyn: Arc<dyn Store> = Arc::clone(&store);
    let facade = Facade::new(store_dyn, Arc::clone(&registry));
    Fixture { store, registry, facade }
}
