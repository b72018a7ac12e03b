//! Atomic, FIFO claim under concurrent claimers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use pipeline_engine::persistence::Store;

use crate::support::fixture;

/// Seed 5 pending runs (oldest to newest), launch 10 concurrent claimers:
/// exactly 5 distinct runs are claimed and no run is claimed twice; the
/// other 5 calls return none.
#[tokio::test]
async fn claim_is_atomic_and_distinct_under_contention() {
    let fx = fixture();
    let pipeline = fx.store.create_pipeline("p", None, None).await.unwrap();

    let mut seeded = Vec::new();
    for _ in 0..5 {
        let (run, _) = fx
            .store
            .create_run_with_steps(pipeline.id, &["s".to_string()], "manual")
            .await
            .unwrap();
        seeded.push(run.id);
        // Separate `startedAt` values so FIFO order is unambiguous.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let store = fx.store.clone();
    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.claim_one_pending_run().await.unwrap() }));
    }

    let mut claimed = Vec::new();
    let mut none_count = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Some(claimed_run) => claimed.push(claimed_run.run.id),
            None => none_count += 1,
        }
    }

    assert_eq!(claimed.len(), 5, "exactly 5 callers should receive a run");
    assert_eq!(none_count, 5, "the other 5 callers should receive none");

    let distinct: HashSet<_> = claimed.iter().collect();
    assert_eq!(distinct.len(), 5, "no run claimed twice");
    let claimed_set: HashSet<_> = claimed.into_iter().collect();
    let seeded_set: HashSet<_> = seeded.into_iter().collect();
    assert_eq!(claimed_set, seeded_set);
}

/// Two claimer loops alternate against three seeded runs (A oldest, B, C):
/// A is claimed before B or C, B before C, and every run is processed
/// exactly once across both loops.
#[tokio::test]
async fn fifo_holds_across_multiple_claimer_loops() {
    let fx = fixture();
    let pipeline = fx.store.create_pipeline("p", None, None).await.unwrap();

    let (run_a, _) = fx
        .store
        .create_run_with_steps(pipeline.id, &["s".to_string()], "manual")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let (run_b, _) = fx
        .store
        .create_run_with_steps(pipeline.id, &["s".to_string()], "manual")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let (run_c, _) = fx
        .store
        .create_run_with_steps(pipeline.id, &["s".to_string()], "manual")
        .await
        .unwrap();

    // Two "loops" simply drawn from the same store, interleaved.
    let first = fx.store.claim_one_pending_run().await.unwrap().unwrap();
    assert_eq!(first.run.id, run_a.id);
    let second = fx.store.claim_one_pending_run().await.unwrap().unwrap();
    assert_eq!(second.run.id, run_b.id);
    let third = fx.store.claim_one_pending_run().await.unwrap().unwrap();
    assert_eq!(third.run.id, run_c.id);
    assert!(fx.store.claim_one_pending_run().await.unwrap().is_none());
}
