//! Retry policy for transient submission failures.
//!
//! Chosen curve (upstream leaves it open): 3 attempts total, exponential
//! backoff starting at 30 s and doubling per attempt, capped at 10 minutes.
//! All three knobs live under `[engine]` in the config.

use chrono::Duration;
use matchpoint_core::config::EngineConfig;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_secs: u64,
    pub cap_secs: u64,
}

impl RetryPolicy {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_secs: cfg.backoff_base_secs,
            cap_secs: cfg.backoff_cap_secs,
        }
    }

    /// May another attempt run after `attempts` have completed?
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }

    /// Delay before the attempt following attempt number `attempt` (1-based):
    /// `base × 2^(attempt − 1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let secs = self
            .base_secs
            .saturating_mul(1u64 << exp)
            .min(self.cap_secs);
        Duration::seconds(secs as i64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_curve_is_30_60_120() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::seconds(30));
        assert_eq!(policy.backoff(2), Duration::seconds(60));
        assert_eq!(policy.backoff(3), Duration::seconds(120));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_secs: 30,
            cap_secs: 600,
        };
        assert_eq!(policy.backoff(6), Duration::seconds(600));
        assert_eq!(policy.backoff(30), Duration::seconds(600));
    }

    #[test]
    fn three_attempts_total_by_default() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }
}
