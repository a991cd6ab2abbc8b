//! Retry logic.
//!
//! # Responsibilities
//! - Re-run one logical call after a recoverable failure
//! - Sleep between attempts according to a backoff schedule
//! - Stop early when the failure is not retryable or the gate closes
//!
//! # Design Decisions
//! - Attempts of one invocation are strictly sequential
//! - The callable owns nothing consumed by an attempt, so every attempt
//!   re-sends the same bytes
//! - The gate is consulted before each re-attempt so an open breaker halts
//!   retrying instead of being bypassed

use std::fmt;
use std::time::Duration;
use std::future::Future;
use thiserror::Error;

use crate::config::schema::RetryConfig;
use crate::resilience::backoff::BackoffSchedule;

/// Classification used to decide whether another attempt is worthwhile.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Per-invocation attempt bookkeeping handed to the callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    /// 1-based attempt number.
    pub attempt: u32,
    pub max_attempts: u32,
}

impl RetryContext {
    pub fn is_retry(&self) -> bool {
        self.attempt > 1
    }
}

/// Why a retried call ultimately failed.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every allowed attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The last failure was not retryable.
    #[error("non-retryable failure on attempt {attempts}: {last}")]
    Aborted { attempts: u32, last: E },

    /// The gate refused another attempt.
    #[error("retrying halted after {attempts} attempts: {last}")]
    Halted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::Aborted { attempts, .. }
            | Self::Halted { attempts, .. } => *attempts,
        }
    }

    pub fn last(&self) -> &E {
        match self {
            Self::Exhausted { last, .. } | Self::Aborted { last, .. } | Self::Halted { last, .. } => last,
        }
    }
}

/// Bounded re-attempt strategy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffSchedule,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: BackoffSchedule) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        let max_attempts = if config.enabled { config.max_attempts } else { 1 };
        Self::new(max_attempts, BackoffSchedule::from_config(config))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &BackoffSchedule {
        &self.backoff
    }

    /// Longest a call can take when every attempt runs into `per_attempt`
    /// and every backoff sleeps its maximum.
    pub fn worst_case_duration(&self, per_attempt: Duration) -> Duration {
        let sleeps: Duration = (1..self.max_attempts)
            .map(|failed| self.backoff.max_delay_after(failed))
            .sum();
        per_attempt.saturating_mul(self.max_attempts).saturating_add(sleeps)
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    pub async fn execute<T, E, F, Fut>(&self, call: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetryContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        self.execute_gated(call, || true).await
    }

    /// Like [`execute`](Self::execute), but asks `may_continue` before every
    /// re-attempt.
    pub async fn execute_gated<T, E, F, Fut, G>(
        &self,
        mut call: F,
        mut may_continue: G,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetryContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
        G: FnMut() -> bool,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let ctx = RetryContext {
                attempt,
                max_attempts: self.max_attempts,
            };

            let last = match call(ctx).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !last.is_retryable() {
                return Err(RetryError::Aborted { attempts: attempt, last });
            }
            if attempt >= self.max_attempts {
                return Err(RetryError::Exhausted { attempts: attempt, last });
            }
            if !may_continue() {
                return Err(RetryError::Halted { attempts: attempt, last });
            }

            let delay = self.backoff.delay_after(attempt);
            tracing::info!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %last,
                "Retrying after failure"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, BackoffSchedule::none())
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = policy(3)
            .execute(|ctx| {
                calls.set(calls.get() + 1);
                async move {
                    if ctx.attempt < 3 {
                        Err(TestError::Transient)
                    } else {
                        Ok(ctx.attempt)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_never_exceeds_max_attempts() {
        let calls = Cell::new(0);
        let err = policy(4)
            .execute(|_| {
                calls.set(calls.get() + 1);
                async { Err::<(), _>(TestError::Transient) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.get(), 4);
        assert!(matches!(err, RetryError::Exhausted { attempts: 4, .. }));
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuits() {
        let calls = Cell::new(0);
        let err = policy(5)
            .execute(|_| {
                calls.set(calls.get() + 1);
                async { Err::<(), _>(TestError::Fatal) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.get(), 1);
        assert!(matches!(err, RetryError::Aborted { attempts: 1, last: TestError::Fatal }));
    }

    #[tokio::test]
    async fn test_gate_halts_retrying() {
        let calls = Cell::new(0);
        let err = policy(5)
            .execute_gated(
                |_| {
                    calls.set(calls.get() + 1);
                    async { Err::<(), _>(TestError::Transient) }
                },
                || calls.get() < 2,
            )
            .await
            .unwrap_err();
        assert_eq!(calls.get(), 2);
        assert!(matches!(err, RetryError::Halted { attempts: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_backoff_between_attempts() {
        let retry = RetryPolicy::new(
            3,
            BackoffSchedule::Fixed(vec![Duration::from_millis(100), Duration::from_millis(300)]),
        );
        let start = tokio::time::Instant::now();
        let _ = retry
            .execute(|_| async { Err::<(), _>(TestError::Transient) })
            .await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(400) && elapsed < Duration::from_millis(450));
    }

    #[test]
    fn test_disabled_config_means_single_attempt() {
        let config = RetryConfig {
            enabled: false,
            max_attempts: 5,
            ..RetryConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(0, BackoffSchedule::none()).max_attempts(), 1);
    }

    #[test]
    fn test_worst_case_duration_adds_attempts_and_sleeps() {
        let retry = RetryPolicy::new(
            3,
            BackoffSchedule::Fixed(vec![Duration::from_millis(100), Duration::from_millis(300)]),
        );
        assert_eq!(
            retry.worst_case_duration(Duration::from_millis(600)),
            Duration::from_millis(3 * 600 + 100 + 300)
        );
        assert_eq!(
            policy(1).worst_case_duration(Duration::from_secs(2)),
            Duration::from_secs(2)
        );
    }
}
