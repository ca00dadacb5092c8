//! Exponential backoff retry for transient API failures.
//!
//! Only errors that [`ApiError::is_retryable`](crate::error::ApiError::is_retryable)
//! accepts are attempted again; anything else is returned to the caller on the
//! first failure.

use std::time::Duration;

use rand::Rng;

use crate::{config::ClientConfig, error::Result};

/// Fraction of the computed delay added as random jitter, at most.
const JITTER_RATIO: f64 = 0.1;

/// Retry parameters for one client.
///
/// Immutable once built. The delay before attempt `k + 1` is
/// `min(base_delay * multiplier^(k - 1) + jitter, max_delay)` with jitter drawn
/// uniformly from `[0, 10%]` of the exponential term.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use verisoul_client::reliability::RetryStrategy;
///
/// let strategy = RetryStrategy::new(5, Duration::from_millis(200), 2.0, Duration::from_secs(5));
/// assert_eq!(strategy.max_attempts(), 5);
///
/// // Attempt counts below one are raised to one.
/// let once = RetryStrategy::new(0, Duration::ZERO, 1.0, Duration::ZERO);
/// assert_eq!(once.max_attempts(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    max_attempts: u32,
    base_delay: Duration,
    backoff_multiplier: f64,
    max_delay: Duration,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryStrategy {
    /// Creates a strategy. `max_attempts` is clamped to at least 1 and a
    /// multiplier that is not finite or below 1.0 falls back to 1.0.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        backoff_multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        let backoff_multiplier =
            if backoff_multiplier.is_finite() && backoff_multiplier >= 1.0 { backoff_multiplier } else { 1.0 };

        Self { max_attempts: max_attempts.max(1), base_delay, backoff_multiplier, max_delay }
    }

    /// Builds the strategy from the `retry_*` fields of a client config.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_millis(config.retry_delay_ms),
            config.retry_multiplier,
            Duration::from_millis(config.retry_max_delay_ms),
        )
    }

    /// Total attempts, including the first one.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry, without jitter.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Growth factor applied per attempt.
    #[must_use]
    pub const fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Upper bound for any single delay.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay to wait after `attempt` (1-indexed) failed.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let max_ms = duration_ms(self.max_delay);
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_ms = duration_ms(self.base_delay) * self.backoff_multiplier.powi(exponent);

        if !delay_ms.is_finite() || delay_ms >= max_ms {
            return self.max_delay;
        }

        let jitter_ms = rand::thread_rng().gen_range(0.0..=delay_ms * JITTER_RATIO);
        let total_ms = delay_ms + jitter_ms;
        if total_ms >= max_ms {
            return self.max_delay;
        }

        // f64 rounding near Duration::MAX can still overflow the conversion.
        Duration::try_from_secs_f64(total_ms / 1000.0).map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error or
    /// runs out of attempts.
    ///
    /// Waiting between attempts uses [`tokio::time::sleep`], so the executor
    /// thread is never blocked.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable [`ApiError`](crate::error::ApiError), or
    /// the error of the last attempt once all attempts are used.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::{
    ///     sync::atomic::{AtomicU32, Ordering},
    ///     time::Duration,
    /// };
    ///
    /// use verisoul_client::{ApiError, reliability::RetryStrategy};
    ///
    /// # async fn example() -> verisoul_client::Result<()> {
    /// let strategy = RetryStrategy::new(3, Duration::from_millis(10), 2.0, Duration::from_secs(1));
    /// let calls = &AtomicU32::new(0);
    ///
    /// let value = strategy
    ///     .execute(|| async move {
    ///         if calls.fetch_add(1, Ordering::Relaxed) == 0 {
    ///             Err(ApiError::server("/account/a1", 503, None))
    ///         } else {
    ///             Ok("account")
    ///         }
    ///     })
    ///     .await?;
    ///
    /// assert_eq!(value, "account");
    /// assert_eq!(calls.load(Ordering::Relaxed), 2);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                tracing::debug!(attempt, kind = %error.kind(), "Error is not retryable");
                return Err(error);
            }

            if attempt >= self.max_attempts {
                tracing::warn!(
                    attempt,
                    max_attempts = self.max_attempts,
                    error = %error,
                    "Retry attempts exhausted"
                );
                return Err(error);
            }

            let delay = self.delay_for_attempt(attempt);
            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis(),
                error = %error,
                "Operation failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[allow(clippy::cast_precision_loss, reason = "acceptable for duration calculations")]
fn duration_ms(duration: Duration) -> f64 {
    duration.as_millis() as f64
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    };

    use proptest::prelude::*;
    use tokio::time::Instant;

    use super::*;
    use crate::error::{ApiError, ErrorKind};

    fn strategy(max_attempts: u32, base_ms: u64) -> RetryStrategy {
        RetryStrategy::new(max_attempts, Duration::from_millis(base_ms), 2.0, Duration::from_secs(30))
    }

    #[test]
    fn test_default_strategy() {
        let strategy = RetryStrategy::default();
        assert_eq!(strategy.max_attempts(), 3);
        assert_eq!(strategy.base_delay(), Duration::from_secs(1));
        assert!((strategy.backoff_multiplier() - 2.0).abs() < f64::EPSILON);
        assert_eq!(strategy.max_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_from_config() {
        let mut config = ClientConfig::new("sk_test");
        config.retry_attempts = 4;
        config.retry_delay_ms = 250;
        config.retry_multiplier = 1.5;
        config.retry_max_delay_ms = 2_000;

        let strategy = RetryStrategy::from_config(&config);
        assert_eq!(strategy.max_attempts(), 4);
        assert_eq!(strategy.base_delay(), Duration::from_millis(250));
        assert!((strategy.backoff_multiplier() - 1.5).abs() < f64::EPSILON);
        assert_eq!(strategy.max_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_multiplier_falls_back() {
        let strategy = RetryStrategy::new(3, Duration::from_millis(10), f64::NAN, Duration::from_secs(1));
        assert!((strategy.backoff_multiplier() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let strategy = strategy(5, 1000);

        let first = strategy.delay_for_attempt(1);
        assert!(first >= Duration::from_millis(1000) && first <= Duration::from_millis(1100));

        let second = strategy.delay_for_attempt(2);
        assert!(second >= Duration::from_millis(2000) && second <= Duration::from_millis(2200));

        let third = strategy.delay_for_attempt(3);
        assert!(third >= Duration::from_millis(4000) && third <= Duration::from_millis(4400));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let strategy = RetryStrategy::new(20, Duration::from_secs(1), 2.0, Duration::from_secs(5));
        assert_eq!(strategy.delay_for_attempt(10), Duration::from_secs(5));
        assert_eq!(strategy.delay_for_attempt(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_base_delay() {
        let strategy = strategy(3, 0);
        assert_eq!(strategy.delay_for_attempt(1), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_server_errors() {
        let strategy = strategy(4, 10);
        let calls = Arc::new(AtomicU32::new(0));

        let result = strategy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::Relaxed) + 1;
                    if n < 4 { Err(ApiError::server("/session/s1", 500, None)) } else { Ok(n) }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.load(Ordering::Relaxed), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_error_when_exhausted() {
        let strategy = strategy(3, 10);
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<()> = strategy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::Relaxed) + 1;
                    Err(ApiError::server("/phone", 500 + u16::try_from(n).unwrap(), None))
                }
            })
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.status(), 503);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_error_not_retried() {
        let strategy = strategy(5, 1000);
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<()> = strategy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Err(ApiError::validation("/phone", Some("bad number".to_owned()), None))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_not_retried() {
        let strategy = strategy(3, 10);
        let errors = [
            ApiError::authentication("/x", None),
            ApiError::bad_request("/x", None, None),
            ApiError::not_found("/x", None),
            ApiError::server("/x", 403, None),
            ApiError::business_logic("/x", "invalid account", None),
        ];

        for template in errors {
            let calls = AtomicU32::new(0);
            let kind = template.kind();
            let status = template.status();

            let result: Result<()> = strategy
                .execute(|| {
                    calls.fetch_add(1, Ordering::Relaxed);
                    let error = ApiError::new(kind, "failure", status, "/x");
                    async move { Err(error) }
                })
                .await;

            assert!(result.is_err());
            assert_eq!(calls.load(Ordering::Relaxed), 1, "{kind} ({status}) was retried");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_and_request_timeout_are_retried() {
        for error in [ApiError::rate_limited("/x", None), ApiError::server("/x", 408, None)] {
            let strategy = strategy(2, 10);
            let calls = AtomicU32::new(0);
            let (kind, status) = (error.kind(), error.status());

            let result: Result<()> = strategy
                .execute(|| {
                    calls.fetch_add(1, Ordering::Relaxed);
                    let error = ApiError::new(kind, "failure", status, "/x");
                    async move { Err(error) }
                })
                .await;

            assert!(result.is_err());
            assert_eq!(calls.load(Ordering::Relaxed), 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_errors_sleep_between_attempts() {
        let strategy = strategy(3, 1000);
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let started = Instant::now();

        let result = strategy
            .execute(|| {
                let attempts = Arc::clone(&attempts);
                async move {
                    let mut attempts = attempts.lock().unwrap();
                    attempts.push(Instant::now());
                    if attempts.len() < 3 {
                        Err(ApiError::connection("/account/a1", "connection refused"))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        let elapsed = started.elapsed();
        assert_eq!(result.unwrap(), "ok");

        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 3);

        let first_gap = attempts[1] - attempts[0];
        let second_gap = attempts[2] - attempts[1];
        assert!(first_gap >= Duration::from_millis(1000), "first gap {first_gap:?}");
        assert!(first_gap <= Duration::from_millis(1100), "first gap {first_gap:?}");
        assert!(second_gap >= Duration::from_millis(2000), "second gap {second_gap:?}");
        assert!(second_gap <= Duration::from_millis(2200), "second gap {second_gap:?}");
        assert!(elapsed <= Duration::from_millis(3300), "slept {elapsed:?}");
    }

    #[test]
    fn test_delay_near_duration_max_does_not_overflow() {
        let huge = RetryStrategy::new(3, Duration::from_secs(1), 1.7e19, Duration::MAX);
        assert!(huge.delay_for_attempt(2) <= Duration::MAX);
        assert!(huge.delay_for_attempt(3) <= Duration::MAX);

        let unbounded = RetryStrategy::new(3, Duration::from_secs(1), 2.0, Duration::MAX);
        let delay = unbounded.delay_for_attempt(1);
        assert!(delay >= Duration::from_secs(1), "{delay:?}");
        assert!(delay <= Duration::from_millis(1100), "{delay:?}");
    }

    #[tokio::test]
    async fn test_single_attempt_does_not_sleep() {
        let strategy = strategy(1, 60_000);

        let result: Result<()> =
            strategy.execute(|| async { Err(ApiError::server("/x", 500, None)) }).await;

        assert_eq!(result.unwrap_err().status(), 500);
    }

    proptest! {
        #[test]
        fn delay_stays_within_jitter_bounds(
            attempt in 1u32..12,
            base_ms in 0u64..5_000,
            multiplier in 1.0f64..3.0,
            max_ms in 0u64..120_000,
        ) {
            let strategy = RetryStrategy::new(
                12,
                Duration::from_millis(base_ms),
                multiplier,
                Duration::from_millis(max_ms),
            );

            let delay_ms = strategy.delay_for_attempt(attempt).as_secs_f64() * 1000.0;
            let exponential = duration_ms(Duration::from_millis(base_ms))
                * multiplier.powi(i32::try_from(attempt - 1).unwrap());
            let cap = duration_ms(Duration::from_millis(max_ms));

            let lower = exponential.min(cap);
            let upper = (exponential * (1.0 + JITTER_RATIO)).min(cap);

            prop_assert!(delay_ms >= lower - 0.001, "{delay_ms} < {lower}");
            prop_assert!(delay_ms <= upper + 0.001, "{delay_ms} > {upper}");
        }
    }
}
