use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Retry settings for one class of node calls.
///
/// Delays run base, 2x base, 4x base, ... capped at `max_delay`, each with up
/// to `jitter` of random extra delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Cap on the doubled delay.
    pub max_delay: Duration,
    /// Upper bound of the random extra delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(3),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: Some(1),
            ..Self::default()
        }
    }

    /// The same delays, but never give up.
    pub fn unbounded(self) -> Self {
        Self {
            max_attempts: None,
            ..self
        }
    }

    /// Deterministic part of the delay after the `attempt`-th failure (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether another attempt is allowed after `failures` failed attempts.
    pub fn allows_retry(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures < max)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    /// Run `op` until it succeeds or the attempt budget is spent, sleeping
    /// between attempts. Returns the last error on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut failures = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if !self.allows_retry(failures) {
                        return Err(e);
                    }
                    let delay = self.backoff(failures - 1) + self.jitter();
                    warn!(
                        what,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "node call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
