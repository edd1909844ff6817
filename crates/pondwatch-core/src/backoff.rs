// ── Reconnection backoff ──
//
// Pure delay computation: `delay(n) = min(base * 2^(n-1), max)` for the
// 1-indexed retry `n`, plus the attempt ceiling after which the client
// gives up and waits for an explicit retry.

use std::time::Duration;

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry. Default: 2s.
    pub base_delay: Duration,

    /// Upper bound on any single delay. Default: 30s.
    pub max_delay: Duration,

    /// Retries allowed before giving up. Default: 5.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1-indexed; `0` is treated as `1`).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let factor = 2_u32.saturating_pow(exponent);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether retry number `attempt` is still within the ceiling.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}
