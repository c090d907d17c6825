//! Retry timing for event delivery.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff bounded by a total time budget.
///
/// There is no attempt limit; `max_time` alone ends the retry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Wait before the first retry; doubles on every further retry.
    pub delay: Duration,

    /// Upper bound for a single wait.
    pub max_delay: Duration,

    /// Wall-clock budget for the whole delivery, retries included.
    pub max_time: Duration,

    /// Jitter factor (0.0 to 1.0) applied to each wait.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(450),
            max_delay: Duration::from_secs(5),
            max_time: Duration::from_secs(35),
            jitter: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Calculate the wait after the given (zero-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self
            .delay
            .saturating_mul(1u32 << attempt.min(31))
            .min(self.max_delay);

        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return delay;
        }

        let delay = delay.as_secs_f64();
        let range = delay * jitter;
        let offset = rand::rng().random_range(-range..=range);
        Duration::from_secs_f64((delay + offset).clamp(0.0, self.max_delay.as_secs_f64()))
    }
}
