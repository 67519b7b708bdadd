// crates/carbon-pipeline/src/retry.rs
//
// Bounded retry with exponential backoff and jitter for idempotent reads.
// Only errors that report `is_retryable()` are retried; everything else is
// returned on the first failure. Nothing that changes ledger state goes
// through here.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use carbon_core::CarbonError;

/// Retry schedule: up to `max_attempts` tries, delays doubling from
/// `base_delay` and capped at `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Un-jittered delay after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// Delay after failed attempt `attempt`, drawn from `[backoff/2, backoff]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let backoff = self.backoff(attempt);
        let half = backoff / 2;
        let spread = (backoff - half).as_millis() as u64;
        let jitter = if spread == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=spread)
        };
        half + Duration::from_millis(jitter)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, CarbonError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CarbonError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        label,
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
