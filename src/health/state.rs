//! Upstream health state machine.
//!
//! # States
//! - Unknown: no check has completed yet (treated as ready)
//! - Healthy: upstream answered its health endpoint
//! - Unhealthy: upstream failed enough consecutive checks
//!
//! # State Transitions
//! ```text
//! Healthy/Unknown → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy/Unknown → Healthy: consecutive successes >= healthy_threshold
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping
//! - Readiness only; breaker state is never touched from here

use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::config::HealthCheckConfig;
use crate::observability::metrics;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

#[derive(Debug)]
pub struct UpstreamHealth {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    healthy_threshold: u32,
    unhealthy_threshold: u32,
}

impl UpstreamHealth {
    pub fn new(healthy_threshold: u32, unhealthy_threshold: u32) -> Self {
        Self {
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            healthy_threshold: healthy_threshold.max(1),
            unhealthy_threshold: unhealthy_threshold.max(1),
        }
    }

    pub fn from_config(config: &HealthCheckConfig) -> Self {
        Self::new(config.healthy_threshold, config.unhealthy_threshold)
    }

    pub fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Relaxed))
    }

    /// Ready unless checks have marked the upstream unhealthy.
    pub fn is_ready(&self) -> bool {
        self.state() != HealthState::Unhealthy
    }

    /// Record a passed check. Returns true on a transition to Healthy.
    pub fn mark_success(&self) -> bool {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if self.state() == HealthState::Healthy {
            return false;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes < self.healthy_threshold {
            return false;
        }
        self.transition(HealthState::Healthy)
    }

    /// Record a failed check. Returns true on a transition to Unhealthy.
    pub fn mark_failure(&self) -> bool {
        self.consecutive_successes.store(0, Ordering::Relaxed);
        if self.state() == HealthState::Unhealthy {
            return false;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures < self.unhealthy_threshold {
            return false;
        }
        self.transition(HealthState::Unhealthy)
    }

    fn transition(&self, to: HealthState) -> bool {
        let from = HealthState::from(self.state.swap(to as u8, Ordering::Relaxed));
        if from == to {
            return false;
        }
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);

        match to {
            HealthState::Unhealthy => tracing::warn!(?from, ?to, "Upstream marked unhealthy"),
            _ => tracing::info!(?from, ?to, "Upstream marked healthy"),
        }
        metrics::record_upstream_health(to != HealthState::Unhealthy);
        true
    }
}
