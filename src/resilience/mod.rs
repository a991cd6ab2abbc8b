//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway invocation:
//!     → circuit_breaker.rs (admission for the operation group)
//!     → retries.rs (sequential attempts, stop on non-retryable or open breaker)
//!         → backoff.rs (delay between attempts)
//!     → circuit_breaker.rs (record every attempt outcome)
//! ```
//!
//! # Design Decisions
//! - Breakers and retry policy are explicit objects wired at construction
//! - Retry is subordinate to the breaker: it never re-attempts past an open circuit
//! - Client-side failures neither retry nor count against the breaker

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;

pub use backoff::BackoffSchedule;
pub use circuit_breaker::{BreakerPermit, BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use retries::{RetryContext, RetryError, RetryPolicy, Retryable};
