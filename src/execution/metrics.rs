//! Process-local counters and a bounded rolling window of execution
//! durations, injected as owned state rather than a process-wide singleton.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;

const DEFAULT_WINDOW_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub executed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
    pub avg: Option<Duration>,
}

pub struct Metrics {
    executed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    window: Mutex<VecDeque<Duration>>,
    window_capacity: usize,
}

impl Metrics {
    pub fn new() -> Self {
        Self::with_window_capacity(DEFAULT_WINDOW_CAPACITY)
    }

    pub fn with_window_capacity(window_capacity: usize) -> Self {
        Self {
            executed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            window: Mutex::new(VecDeque::with_capacity(window_capacity)),
            window_capacity,
        }
    }

    pub async fn record(&self, elapsed: Duration, success: bool) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }

        let mut window = self.window.lock().await;
        if window.len() == self.window_capacity {
            window.pop_front();
        }
        window.push_back(elapsed);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let window = self.window.lock().await;
        let (min, max, avg) = if window.is_empty() {
            (None, None, None)
        } else {
            let min = *window.iter().min().expect("non-empty");
            let max = *window.iter().max().expect("non-empty");
            let total: Duration = window.iter().sum();
            let avg = total / window.len() as u32;
            (Some(min), Some(max), Some(avg))
        };

        MetricsSnapshot {
            executed: self.executed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            min,
            max,
            avg,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
