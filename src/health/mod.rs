//! Upstream health subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → GET <upstream base>/<health path>
//!     → Update state.rs
//!
//! State machine (state.rs):
//!     Unknown → Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//!     → read by /api/health/ready
//! ```
//!
//! # Design Decisions
//! - Health feeds readiness only; circuit breakers react to real traffic
//! - State transitions require consecutive successes/failures

pub mod active;
pub mod state;

pub use active::HealthMonitor;
pub use state::{HealthState, UpstreamHealth};
