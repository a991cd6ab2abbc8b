//! Degraded responses for refused or failed dispatch.

use std::fmt;

use crate::gateway::operation::Operation;
use crate::gateway::response::OperationResponse;
use crate::observability::metrics;
use crate::observability::CorrelationId;
use crate::upstream::UpstreamError;

const UNAVAILABLE: &str = "AI server temporarily unavailable. Please try again shortly.";

/// Why an invocation was degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradeReason {
    /// The breaker refused admission, or opened while retrying.
    CircuitOpen { group: String },
    /// Every allowed attempt failed with a retryable error.
    RetriesExhausted { attempts: u32, last: UpstreamError },
    /// The upstream answered but the answer could not be used.
    UpstreamUnusable { error: UpstreamError },
}

impl DegradeReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CircuitOpen { .. } => "circuit_open",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::UpstreamUnusable { .. } => "upstream_unusable",
        }
    }
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen { group } => write!(f, "circuit open for '{}'", group),
            Self::RetriesExhausted { attempts, last } => {
                write!(f, "upstream failed after {} attempts ({})", attempts, last)
            }
            Self::UpstreamUnusable { error } => write!(f, "upstream response unusable ({})", error),
        }
    }
}

/// Builds the degraded response for an operation.
#[derive(Debug, Clone, Default)]
pub struct FallbackProvider;

impl FallbackProvider {
    pub fn new() -> Self {
        Self
    }

    /// Never fails; always yields the operation's own shape.
    pub fn fallback(
        &self,
        operation: &Operation,
        reason: &DegradeReason,
        correlation_id: &CorrelationId,
    ) -> OperationResponse {
        tracing::warn!(
            correlation_id = %correlation_id,
            operation = operation.name,
            reason = %reason,
            "Serving fallback response"
        );
        metrics::record_fallback(operation.name, reason.label());

        let message = format!("{} ({})", UNAVAILABLE, reason);
        OperationResponse::degraded(operation.schema, message, correlation_id)
    }
}
