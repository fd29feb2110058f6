//! Retry strategy and per-request retry policy.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type DelayFn = dyn Fn(u32) -> Option<Duration> + Send + Sync;

/// Maps a retry attempt number (starting at 1) to the delay before that
/// attempt. Returning `None` stops retrying.
#[derive(Clone)]
pub struct RetryStrategy {
    delay_fn: Arc<DelayFn>,
    kind: &'static str,
}

impl fmt::Debug for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryStrategy").field("kind", &self.kind).finish()
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::linear(Duration::from_millis(50), Duration::from_millis(2000))
    }
}

impl RetryStrategy {
    /// Delay grows by `step` per attempt and is capped at `cap`.
    pub fn linear(step: Duration, cap: Duration) -> Self {
        Self {
            delay_fn: Arc::new(move |attempt| Some(step.saturating_mul(attempt).min(cap))),
            kind: "linear",
        }
    }

    /// Same delay before every attempt.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay_fn: Arc::new(move |_| Some(delay)),
            kind: "fixed",
        }
    }

    /// Never retry.
    pub fn never() -> Self {
        Self {
            delay_fn: Arc::new(|_| None),
            kind: "never",
        }
    }

    /// Caller-supplied strategy.
    pub fn custom(f: impl Fn(u32) -> Option<Duration> + Send + Sync + 'static) -> Self {
        Self {
            delay_fn: Arc::new(f),
            kind: "custom",
        }
    }

    /// Returns the delay before `attempt`, or `None` to stop.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        (self.delay_fn)(attempt)
    }
}

/// Bounded retry around a single request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay schedule.
    pub strategy: RetryStrategy,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::default(),
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy from a strategy and a retry budget.
    pub fn new(strategy: RetryStrategy, max_retries: u32) -> Self {
        Self { strategy, max_retries }
    }

    /// Runs `f` until it succeeds, the error is not retriable, the retry
    /// budget is spent, or the strategy says stop. Returns the last error.
    pub async fn execute<F, Fut, T, E>(&self, is_retriable: impl Fn(&E) -> bool, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 0u32;

        loop {
            let error = match f().await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            if attempt >= self.max_retries || !is_retriable(&error) {
                return Err(error);
            }

            attempt += 1;
            let Some(delay) = self.strategy.delay_for_attempt(attempt) else {
                debug!(attempt, error = %error, "Retry strategy stopped retrying");
                return Err(error);
            };

            debug!(attempt, delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), error = %error, "Retrying after failure");
            tokio::time::sleep(delay).await;
        }
    }
}
