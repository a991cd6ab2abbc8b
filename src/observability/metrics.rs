//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_upstream_attempts_total` (counter): attempts by operation, outcome
//! - `gateway_upstream_duration_seconds` (histogram): attempt latency
//! - `gateway_invocations_total` (counter): invocations by operation, outcome
//! - `gateway_fallbacks_total` (counter): degraded responses by reason
//! - `gateway_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_breaker_transitions_total` (counter): transitions by target state
//! - `gateway_upstream_healthy` (gauge): 1=healthy, 0=unhealthy

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_upstream_attempt(operation: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!("gateway_upstream_attempts_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    histogram!("gateway_upstream_duration_seconds", "operation" => operation)
        .record(elapsed.as_secs_f64());
}

pub fn record_invocation(operation: &'static str, outcome: &'static str) {
    counter!("gateway_invocations_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}

pub fn record_fallback(operation: &'static str, reason: &'static str) {
    counter!("gateway_fallbacks_total", "operation" => operation, "reason" => reason).increment(1);
}

pub fn record_breaker_transition(group: &str, to: &'static str, state_value: f64) {
    counter!("gateway_breaker_transitions_total", "group" => group.to_string(), "to" => to)
        .increment(1);
    gauge!("gateway_breaker_state", "group" => group.to_string()).set(state_value);
}

pub fn record_upstream_health(healthy: bool) {
    gauge!("gateway_upstream_healthy").set(if healthy { 1.0 } else { 0.0 });
}
