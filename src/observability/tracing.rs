//! Spans for gateway invocations.

use tracing::Span;

use crate::observability::correlation::CorrelationId;

/// Span covering one invocation; every event inside inherits the
/// correlation id and operation name.
pub fn invocation_span(operation: &'static str, correlation_id: &CorrelationId) -> Span {
    tracing::info_span!(
        "invoke",
        operation = operation,
        correlation_id = %correlation_id,
    )
}
