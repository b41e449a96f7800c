use std::time::Duration;

/// Capped exponential backoff: `min(base * 2^attempt, max_delay)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max_delay: Duration) -> Self {
        Self { base, max_delay }
    }

    pub fn from_millis(base_ms: u64, max_delay_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(max_delay_ms),
        )
    }

    /// Wait before the retry that follows failed attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.min(31);
        self.base
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}
