//! One Claimer loop per worker: repeatedly claims a pending Run, drives it
//! through a Run Executor, records metrics, and sleeps (jittered) only when
//! idle. Correctness rests entirely on `Store::claim_one_pending_run`'s
//! atomic FIFO guarantee; this loop adds no coordination of its own.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::core::registry::Registry;
use crate::persistence::Store;

use super::metrics::Metrics;
use super::run_executor;

pub struct Claimer {
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
    poll_interval: (Duration, Duration),
}

impl Claimer {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<Registry>,
        metrics: Arc<Metrics>,
        poll_interval: (Duration, Duration),
    ) -> Self {
        Self {
            store,
            registry,
            metrics,
            poll_interval,
        }
    }

    /// Runs until `shutdown` fires. A Run already in flight when shutdown
    /// fires is allowed to finish; only the idle-poll loop is interrupted.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            match self.store.claim_one_pending_run().await {
                Ok(Some(claimed)) => {
                    self.execute_claimed(claimed).await;
                    // No sleep: go straight back to claiming while busy.
                }
                Ok(None) => {
                    let sleep_for = self.jittered_idle_sleep();
                    tokio::select! {
                        _ = tokio::time::sleep(sleep_for) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                return;
                            }
                        }
                    }
                }
                Err(error) => {
                    warn!(%error, "claim failed, backing off");
                    tokio::time::sleep(self.jittered_idle_sleep()).await;
                }
            }
        }
    }

    async fn execute_claimed(&self, claimed: crate::persistence::ClaimedRun) {
        let run = claimed.run;
        let t0 = Instant::now();

        let definition = match self.registry.get(&claimed.pipeline_name) {
            Ok(definition) => definition,
            Err(error) => {
                warn!(run_id = %run.id, pipeline = %claimed.pipeline_name, %error, "pipeline not in registry");
                if let Err(e) = self
                    .store
                    .update_run_status(run.id, crate::core::state::RunStatus::Failed, Some(chrono::Utc::now()))
                    .await
                {
                    error!(run_id = %run.id, error = %e, "failed to mark run failed after missing pipeline");
                }
                self.metrics.record(t0.elapsed(), false).await;
                return;
            }
        };

        let result = run_executor::execute(
            Arc::clone(&self.store),
            &run,
            definition,
            Default::default(),
            Default::default(),
        )
        .await;

        match result {
            Ok(status) => {
                let success = status == crate::core::state::RunStatus::Success;
                info!(run_id = %run.id, %status, "run finished");
                self.metrics.record(t0.elapsed(), success).await;
            }
            Err(error) => {
                error!(run_id = %run.id, %error, "run executor failed");
                self.metrics.record(t0.elapsed(), false).await;
            }
        }
    }

    fn jittered_idle_sleep(&self) -> Duration {
        let (low, high) = self.poll_interval;
        if low >= high {
            return low;
        }
        rand::thread_rng().gen_range(low..high)
    }
}
