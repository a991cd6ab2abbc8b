//! Backoff schedules: fixed lists or exponential with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::schema::{BackoffStrategy, RetryConfig};

/// Delays slept between consecutive attempts of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffSchedule {
    /// Explicit delays; the last one repeats once the list runs out.
    Fixed(Vec<Duration>),
    /// Doubling delay from `base`, capped at `max`.
    Exponential {
        base: Duration,
        max: Duration,
        jitter: bool,
    },
}

impl BackoffSchedule {
    pub fn from_config(config: &RetryConfig) -> Self {
        match config.backoff {
            BackoffStrategy::Fixed => Self::Fixed(
                config
                    .schedule_ms
                    .iter()
                    .copied()
                    .map(Duration::from_millis)
                    .collect(),
            ),
            BackoffStrategy::Exponential => Self::Exponential {
                base: Duration::from_millis(config.base_delay_ms),
                max: Duration::from_millis(config.max_delay_ms),
                jitter: config.jitter,
            },
        }
    }

    /// A schedule that never waits.
    pub fn none() -> Self {
        Self::Fixed(Vec::new())
    }

    /// Delay to sleep after `failed_attempts` attempts have failed.
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        match self {
            Self::Fixed(delays) => {
                let idx = failed_attempts.saturating_sub(1) as usize;
                delays
                    .get(idx)
                    .or_else(|| delays.last())
                    .copied()
                    .unwrap_or(Duration::ZERO)
            }
            Self::Exponential { base, max, jitter } => {
                let base_ms = base.as_millis() as u64;
                let max_ms = max.as_millis() as u64;
                if *jitter {
                    calculate_backoff(failed_attempts, base_ms, max_ms)
                } else {
                    Duration::from_millis(exponential_delay_ms(failed_attempts, base_ms, max_ms))
                }
            }
        }
    }

    /// Upper bound of [`delay_after`](Self::delay_after), jitter included.
    pub fn max_delay_after(&self, failed_attempts: u32) -> Duration {
        match self {
            Self::Fixed(_) => self.delay_after(failed_attempts),
            Self::Exponential { base, max, jitter } => {
                let capped = exponential_delay_ms(failed_attempts, base.as_millis() as u64, max.as_millis() as u64);
                let jitter_ms = if *jitter { capped / 10 } else { 0 };
                Duration::from_millis(capped + jitter_ms)
            }
        }
    }
}

fn exponential_delay_ms(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    if attempt == 0 {
        return 0;
    }
    let exponential_base = 2u64.saturating_pow(attempt - 1);
    base_ms.saturating_mul(exponential_base).min(max_ms)
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let capped_delay = exponential_delay_ms(attempt, base_ms, max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
