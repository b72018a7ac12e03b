//! Process-wide configuration, loaded once from the environment at startup.

use std::time::Duration;

/// Every variable documented here has a default; none is required to start
/// the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub log_level: String,
    pub logs_dir: Option<String>,
    pub worker_poll_interval: (Duration, Duration),
    pub recovery_interval: Duration,
    pub recovery_staleness_threshold: Duration,
    pub default_step_timeout: Option<Duration>,
    pub default_max_retries: u32,
    pub claimer_worker_count: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env_string("DATABASE_URL", "postgres://localhost/pipeline_engine"),
            log_level: env_string("LOG_LEVEL", "info"),
            logs_dir: std::env::var("LOGS_DIR").ok(),
            worker_poll_interval: (Duration::from_millis(200), Duration::from_millis(1000)),
            recovery_interval: Duration::from_secs(env_u64("RECOVERY_INTERVAL_SECS", 300)),
            recovery_staleness_threshold: Duration::from_secs(env_u64(
                "RECOVERY_STALENESS_THRESHOLD_SECS",
                600,
            )),
            default_step_timeout: std::env::var("DEFAULT_STEP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs),
            default_max_retries: env_u64("DEFAULT_MAX_RETRIES", 0) as u32,
            claimer_worker_count: env_u64("CLAIMER_WORKER_COUNT", 1) as usize,
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
