//! Exponential backoff with jitter: `backoff(n) = min(cap, base * 2^(n-1))
//! +/- uniform_jitter`. Monotonic non-decreasing in `n` and bounded by `cap`.

use std::time::Duration;

use rand::Rng;

const DEFAULT_BASE: Duration = Duration::from_secs(1);
const DEFAULT_CAP: Duration = Duration::from_secs(60);

/// `attempt_count` is the Step's `attemptCount` immediately after incrementing
/// for the retry about to be scheduled (i.e. the `n` in the formula).
pub fn backoff(attempt_count: u32, base: Duration, cap: Duration) -> Duration {
    let exponent = attempt_count.saturating_sub(1);
    let unjittered = base
        .checked_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX))
        .unwrap_or(cap)
        .min(cap);

    let jitter_ms = (unjittered.as_millis() / 4).max(1) as u64;
    let delta = rand::thread_rng().gen_range(0..=jitter_ms);
    let jittered = if rand::thread_rng().gen_bool(0.5) {
        unjittered.saturating_add(Duration::from_millis(delta))
    } else {
        unjittered.saturating_sub(Duration::from_millis(delta))
    };
    jittered.min(cap)
}

pub fn default_backoff(attempt_count: u32) -> Duration {
    backoff(attempt_count, DEFAULT_BASE, DEFAULT_CAP)
}
