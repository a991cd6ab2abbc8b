//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway invocation:
//!     → correlation.rs (issue id)
//!     → tracing.rs (span carrying id + operation)
//!     → logging.rs (structured events inside the span)
//!     → metrics.rs (attempts, fallbacks, breaker state)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Correlation id flows through every log line and the upstream request
//! - Metrics are cheap (atomic increments); without an installed recorder
//!   they are no-ops

pub mod correlation;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use correlation::{CorrelationId, CorrelationTracker};
