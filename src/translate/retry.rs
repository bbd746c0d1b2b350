use async_trait::async_trait;
use std::time::Duration;

use crate::config::RetryConfig;

/// Where the orchestrator waits. Swapped out in tests to record delays
/// instead of sleeping.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeping on the tokio timer
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Exponential backoff for failed batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_secs(config.base_delay_secs),
            max_retries: config.max_retries,
        }
    }

    /// Delay before the retry that follows the `failures`-th consecutive failure
    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 1u32
            .checked_shl(failures.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Whether another attempt is allowed after `failures` consecutive failures
    pub fn should_retry(&self, failures: u32) -> bool {
        failures <= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(10),
            max_retries: 5,
        };
        let delays: Vec<_> = (1..=4).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(delays, vec![10, 20, 40, 80]);
    }

    #[test]
    fn test_retry_budget() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            base_delay_secs: 1,
            max_retries: 2,
            pacing_ms: 0,
        });
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_huge_failure_count_saturates() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(10),
            max_retries: 100,
        };
        assert_eq!(policy.delay_for(64), Duration::from_secs(10).saturating_mul(u32::MAX));
    }
}
