//! A wave runs its steps concurrently, so total wall-clock reflects the
//! slowest step in the wave, not the sum.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pipeline_engine::core::pipeline::PipelineDefinition;
use pipeline_engine::core::state::RunStatus;
use pipeline_engine::core::step::StepDefinition;
use pipeline_engine::execution::execute;
use pipeline_engine::persistence::Store;
use pipeline_engine::planner::plan;

use crate::support::{fixture, Fixed, Sleeper};

#[tokio::test]
async fn wave_executes_its_steps_concurrently() {
    let fx = fixture();
    let pipeline = fx.store.create_pipeline("diamond", None, None).await.unwrap();
    let (run, _) = fx
        .store
        .create_run_with_steps(
            pipeline.id,
            &["gen".to_string(), "alpha".to_string(), "beta".to_string(), "merge".to_string()],
            "manual",
        )
        .await
        .unwrap();

    let steps = vec![
        StepDefinition::new("gen", Arc::new(Fixed(serde_json::json!({})))),
        StepDefinition::new("alpha", Arc::new(Sleeper { millis: 150 })).depends_on(vec!["gen".to_string()]),
        StepDefinition::new("beta", Arc::new(Sleeper { millis: 200 })).depends_on(vec!["gen".to_string()]),
        StepDefinition::new("merge", Arc::new(Fixed(serde_json::json!({}))))
            .depends_on(vec!["alpha".to_string(), "beta".to_string()]),
    ];
    let definition = Arc::new(PipelineDefinition::new("diamond", steps).unwrap());

    let planned = plan(&definition).unwrap();
    assert_eq!(planned.waves, vec![vec!["gen"], vec!["alpha", "beta"], vec!["merge"]]);

    let t0 = Instant::now();
    let status = execute(fx.store.clone(), &run, definition, Default::default(), Default::default())
        .await
        .unwrap();
    let elapsed = t0.elapsed();

    assert_eq!(status, RunStatus::Success);
    // Sequential execution of alpha+beta would take >= 350ms; concurrent
    // execution should land close to the slower of the two (200ms) plus
    // scheduling overhead, well under the sequential sum.
    assert!(elapsed < Duration::from_millis(320), "wave did not run concurrently: {elapsed:?}");
}
