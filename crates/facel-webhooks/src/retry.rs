//! Exponential backoff policy.
//!
//! Pure functions mapping attempt number to delay, shared by the webhook
//! dispatcher and the transmission worker. Jitter is supplied by the
//! caller so scheduling stays deterministic under test.

use chrono::{DateTime, Duration, Utc};

/// Upper bound for the random jitter added to a computed delay.
pub const MAX_JITTER_MS: u64 = 1000;

/// Cap on the exponent so large attempt counts cannot overflow.
const MAX_SHIFT: u32 = 16;

/// Backoff schedule: `base, 2*base, 4*base, ...` for attempts `1, 2, 3, ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Total attempt budget, including the first attempt.
    pub max_attempts: i32,
}

impl RetryPolicy {
    /// Create a policy with the given base delay in seconds.
    #[must_use]
    pub fn new(base_delay_secs: i64, max_attempts: i32) -> Self {
        Self {
            base_delay: Duration::seconds(base_delay_secs),
            max_attempts,
        }
    }

    /// True once `attempts` has consumed the whole budget.
    #[must_use]
    pub fn is_exhausted(&self, attempts: i32) -> bool {
        attempts >= self.max_attempts
    }

    /// Un-jittered delay after the `attempt`-th failure (1-based):
    /// `base * 2^(attempt-1)`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: i32) -> Duration {
        let shift = u32::try_from(attempt.max(1) - 1)
            .unwrap_or(MAX_SHIFT)
            .min(MAX_SHIFT);
        self.base_delay * 2i32.pow(shift)
    }

    /// Next retry timestamp after the `attempt`-th failure, with jitter.
    #[must_use]
    pub fn next_retry_at(
        &self,
        attempt: i32,
        now: DateTime<Utc>,
        jitter_ms: u64,
    ) -> DateTime<Utc> {
        let jitter = Duration::milliseconds(i64::try_from(jitter_ms.min(MAX_JITTER_MS)).unwrap_or(0));
        now + self.delay_for_attempt(attempt) + jitter
    }
}

/// Draw a jitter value in `0..=MAX_JITTER_MS`.
#[must_use]
pub fn random_jitter_ms() -> u64 {
    use rand::Rng;
    rand::thread_rng().gen_range(0..=MAX_JITTER_MS)
}
