//! Retrying fetch orchestration.
//!
//! Wraps a remote call with bounded retries, exponential backoff with
//! jitter, and a hard per-attempt timeout. Jitter spreads concurrent
//! callers' retries so a flaky backend is not hit by synchronized storms;
//! the per-attempt timeout guarantees no attempt hangs even if the remote
//! capability never resolves.

use crate::error::{SyncError, SyncResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

/// Retry behavior configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Backoff base; attempt `n` waits about `base * 2^n`.
    pub base_delay: Duration,
    /// Hard timeout applied to every individual attempt.
    pub attempt_timeout: Duration,
    /// Upper bound on any single backoff delay.
    pub delay_cap: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(30),
            delay_cap: Duration::from_secs(30),
        }
    }
}

/// One attempt within the retry loop. Ephemeral; exists only for logging.
#[derive(Debug)]
struct FetchAttempt {
    attempt_number: u32,
    started_at: Instant,
}

/// Executes remote operations under a retry budget.
#[derive(Debug, Clone, Default)]
pub struct RetryingFetcher {
    config: RetryConfig,
}

impl RetryingFetcher {
    /// Creates a fetcher with the given retry configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the retry configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `op` until it succeeds, fails non-retryably, or the attempt
    /// budget runs out.
    ///
    /// `label` names the data type being fetched and is carried into the
    /// terminal [`SyncError::RetriesExhausted`] along with the attempt
    /// count and the final cause.
    pub async fn fetch<T, F, Fut>(&self, label: &str, op: F) -> SyncResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let max = self.config.max_attempts.max(1);
        let mut last_err = SyncError::Network("no attempts made".into());

        for attempt in 0..max {
            let record = FetchAttempt {
                attempt_number: attempt,
                started_at: Instant::now(),
            };

            let result = match timeout(self.config.attempt_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(SyncError::Timeout),
            };

            match result {
                Ok(value) => {
                    debug!(
                        label,
                        attempt = record.attempt_number,
                        elapsed_ms = record.started_at.elapsed().as_millis() as u64,
                        "fetch succeeded"
                    );
                    return Ok(value);
                }
                Err(err) => {
                    if !err.is_retryable() {
                        warn!(label, attempt, error = %err, "non-retryable fetch error");
                        return Err(err);
                    }
                    warn!(label, attempt, error = %err, "retryable fetch error");
                    last_err = err;
                }
            }

            if attempt + 1 < max {
                let delay = self.backoff_delay(attempt);
                debug!(label, attempt, delay_ms = delay.as_millis() as u64, "backing off");
                sleep(delay).await;
            }
        }

        Err(SyncError::RetriesExhausted {
            label: label.to_string(),
            attempts: max,
            source: Box::new(last_err),
        })
    }

    /// `min(base * 2^attempt + jitter, cap)` with
    /// `jitter ∈ [0, 0.1 * base * 2^attempt)`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.config.base_delay.as_millis() as f64 * 2f64.powi(attempt as i32);
        let jitter = rand::thread_rng().gen_range(0.0..0.1) * exp;
        let capped = (exp + jitter).min(self.config.delay_cap.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}
