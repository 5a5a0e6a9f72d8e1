//! Retry engine with configurable backoff and jitter.
//!
//! Wraps any unreliable remote call with bounded, predicate-gated
//! retries, and provides a polling helper for waiting on a remote
//! "ready" state.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^attempt
    #[default]
    Exponential,
    /// delay = base * (attempt + 1)
    Linear,
    /// delay = base (constant)
    Constant,
}

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
}

/// Policy describing how an operation is retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the initial one.
    pub max_attempts: usize,
    /// Base delay between attempts in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Jitter strategy.
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff: BackoffStrategy::Exponential,
            jitter: JitterStrategy::Full,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }

    /// Calculates the delay before the next attempt.
    ///
    /// `attempt` is 0-indexed: the delay after the first failure uses
    /// `attempt = 0`.
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base = self.base_delay_ms;
        let capped = match self.backoff {
            BackoffStrategy::Exponential => base
                .saturating_mul(2u64.saturating_pow(attempt as u32))
                .min(self.max_delay_ms),
            BackoffStrategy::Linear => base
                .saturating_mul((attempt + 1) as u64)
                .min(self.max_delay_ms),
            BackoffStrategy::Constant => base.min(self.max_delay_ms),
        };

        let jittered = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => {
                if capped == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=capped)
                }
            }
            JitterStrategy::Equal => {
                let half = capped / 2;
                if half == 0 {
                    capped
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Executes `operation` under the retry policy.
///
/// Retries only while `is_retryable` approves the error and attempts
/// remain; the final error is returned to the caller either way. The
/// number of attempts actually made is reported alongside the error so
/// callers can surface it.
pub async fn with_retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T, (E, usize)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 0usize;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let attempts_made = attempt + 1;
                if attempts_made >= max || !is_retryable(&err) {
                    return Err((err, attempts_made));
                }

                let delay = policy.delay_for(attempt);
                tracing::debug!(
                    operation = label,
                    attempt = attempts_made,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Outcome of a bounded polling loop.
#[derive(Debug)]
pub enum PollOutcome<T, E> {
    /// The probed condition was satisfied.
    Ready(T),
    /// The deadline elapsed without the condition being satisfied.
    TimedOut,
    /// The probe reported a definitive failure; polling stopped.
    Aborted(E),
}

/// What a single poll probe observed.
#[derive(Debug)]
pub enum Probe<T, E> {
    /// Condition satisfied; stop polling.
    Ready(T),
    /// Not there yet; poll again after the interval.
    Pending,
    /// Definitive failure; stop polling immediately.
    Abort(E),
}

/// Polls `probe` every `interval` until it reports ready or aborts,
/// or until `timeout` elapses.
pub async fn poll_until<T, E, F, Fut>(
    interval: Duration,
    timeout: Duration,
    mut probe: F,
) -> PollOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Probe<T, E>>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match probe().await {
            Probe::Ready(value) => return PollOutcome::Ready(value),
            Probe::Abort(err) => return PollOutcome::Aborted(err),
            Probe::Pending => {
                if tokio::time::Instant::now() + interval > deadline {
                    return PollOutcome::TimedOut;
                }
                tokio::time::sleep(interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.backoff, BackoffStrategy::Exponential);
    }

    #[test]
    fn test_exponential_delay_no_jitter() {
        let policy = RetryPolicy::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Exponential)
            .with_jitter(JitterStrategy::None);

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn test_linear_delay_no_jitter() {
        let policy = RetryPolicy::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Linear)
            .with_jitter(JitterStrategy::None);

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(300));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::new()
            .with_base_delay_ms(1000)
            .with_max_delay_ms(5000)
            .with_jitter(JitterStrategy::None);

        assert_eq!(policy.delay_for(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_full_jitter_bounds() {
        let policy = RetryPolicy::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Constant)
            .with_jitter(JitterStrategy::Full);

        for _ in 0..50 {
            assert!(policy.delay_for(0) <= Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn test_with_retry_success_first_try() {
        let policy = RetryPolicy::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        let result: Result<i32, (String, usize)> =
            with_retry(&policy, "test", |_| true, move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                }
            })
            .await;

        assert!(matches!(result, Ok(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_succeeds_on_third_attempt() {
        let policy = RetryPolicy::new()
            .with_max_attempts(5)
            .with_base_delay_ms(1)
            .with_jitter(JitterStrategy::None);

        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        let result: Result<i32, (String, usize)> =
            with_retry(&policy, "busy", |_| true, move || {
                let c = c.clone();
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(format!("busy, attempt {n}"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert!(matches!(result, Ok(7)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_non_retryable() {
        let policy = RetryPolicy::new()
            .with_max_attempts(5)
            .with_base_delay_ms(1);

        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        let result: Result<i32, (String, usize)> =
            with_retry(&policy, "fatal", |_| false, move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("definitive".to_string())
                }
            })
            .await;

        let (err, attempts) = result.unwrap_err();
        assert_eq!(err, "definitive");
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_exhaustion_reports_attempts() {
        let policy = RetryPolicy::new()
            .with_max_attempts(3)
            .with_base_delay_ms(1)
            .with_jitter(JitterStrategy::None);

        let result: Result<i32, (String, usize)> =
            with_retry(&policy, "always-fails", |_| true, || async {
                Err("transient".to_string())
            })
            .await;

        let (_, attempts) = result.unwrap_err();
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_poll_until_ready() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        let outcome: PollOutcome<&str, String> = poll_until(
            Duration::from_millis(1),
            Duration::from_secs(1),
            move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                        Probe::Ready("active")
                    } else {
                        Probe::Pending
                    }
                }
            },
        )
        .await;

        assert!(matches!(outcome, PollOutcome::Ready("active")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_abort_is_immediate() {
        let outcome: PollOutcome<(), &str> = poll_until(
            Duration::from_millis(1),
            Duration::from_secs(1),
            || async { Probe::Abort("update failed") },
        )
        .await;

        assert!(matches!(outcome, PollOutcome::Aborted("update failed")));
    }

    #[tokio::test]
    async fn test_poll_until_times_out() {
        let outcome: PollOutcome<(), String> = poll_until(
            Duration::from_millis(5),
            Duration::from_millis(12),
            || async { Probe::Pending },
        )
        .await;

        assert!(matches!(outcome, PollOutcome::TimedOut));
    }
}
