//! Gateway subsystem.
//!
//! # Data Flow
//! ```text
//! invoke(operation, payload)
//!     → correlation id (issued, or reused from the inbound request)
//!     → breaker admission (refused → fallback.rs, no network)
//!     → retry policy
//!         → upstream send → decode (response.rs)
//!         → breaker update per attempt
//!     → mapped response, or fallback.rs
//! ```
//!
//! # Design Decisions
//! - Breakers are wired per operation group once, at construction
//! - Every attempt outcome is reported through the invocation's breaker
//!   permit as it happens; retrying stops as soon as the permit may no
//!   longer continue
//! - While Half-Open only the probe's outcome moves the breaker
//! - Caller input errors are rejected before admission and never touch the
//!   breaker

pub mod error;
pub mod fallback;
pub mod operation;
pub mod response;

pub use error::GatewayError;
pub use fallback::{DegradeReason, FallbackProvider};
pub use operation::{Operation, OperationKind};
pub use response::OperationResponse;

use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::config::{BreakerScope, GatewayConfig};
use crate::observability::metrics;
use crate::observability::tracing::invocation_span;
use crate::observability::{CorrelationId, CorrelationTracker};
use crate::resilience::{BreakerPermit, BreakerRegistry, RetryContext, RetryError, RetryPolicy};
use crate::upstream::{InitError, Payload, Upstream, UpstreamClient, UpstreamError};

/// Breaker group shared by every guarded operation under `BreakerScope::Shared`.
pub const SHARED_GROUP: &str = "upstream";

/// Result of an invocation that reached a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(OperationResponse),
    Degraded {
        response: OperationResponse,
        reason: DegradeReason,
    },
}

impl Outcome {
    pub fn response(&self) -> &OperationResponse {
        match self {
            Outcome::Success(response) | Outcome::Degraded { response, .. } => response,
        }
    }

    pub fn into_inner(self) -> OperationResponse {
        match self {
            Outcome::Success(response) | Outcome::Degraded { response, .. } => response,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&DegradeReason> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }
}

/// Composes the upstream client with breakers, retry and fallback.
pub struct Gateway {
    upstream: Arc<dyn Upstream>,
    breakers: BreakerRegistry,
    retry: RetryPolicy,
    fallback: FallbackProvider,
    tracker: CorrelationTracker,
    read_timeout: Duration,
}

impl Gateway {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, InitError> {
        let client = UpstreamClient::new(&config.upstream)?;
        Ok(Self::with_upstream(Arc::new(client), config))
    }

    /// Wire breakers and retry from `config` around any transport.
    pub fn with_upstream(upstream: Arc<dyn Upstream>, config: &GatewayConfig) -> Self {
        Self::new(
            upstream,
            breakers_from_config(config),
            RetryPolicy::from_config(&config.retries),
            Duration::from_millis(config.upstream.read_timeout_ms),
        )
    }

    pub fn new(
        upstream: Arc<dyn Upstream>,
        breakers: BreakerRegistry,
        retry: RetryPolicy,
        read_timeout: Duration,
    ) -> Self {
        Self {
            upstream,
            breakers,
            retry,
            fallback: FallbackProvider::new(),
            tracker: CorrelationTracker::new(),
            read_timeout,
        }
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    pub fn tracker(&self) -> &CorrelationTracker {
        &self.tracker
    }

    /// Invoke `kind` under a freshly issued correlation id.
    pub async fn invoke(&self, kind: OperationKind, payload: Payload) -> Result<Outcome, GatewayError> {
        let correlation_id = self.tracker.new_id();
        self.invoke_with_id(kind, payload, correlation_id).await
    }

    /// Invoke `kind` under an id the caller already holds.
    pub async fn invoke_with_id(
        &self,
        kind: OperationKind,
        payload: Payload,
        correlation_id: CorrelationId,
    ) -> Result<Outcome, GatewayError> {
        let operation = kind.descriptor();
        if payload.is_empty() {
            tracing::debug!(correlation_id = %correlation_id, operation = operation.name, "Rejecting empty payload");
            metrics::record_invocation(operation.name, "rejected");
            return Err(GatewayError::EmptyPayload);
        }

        let span = invocation_span(operation.name, &correlation_id);
        let result = self
            .run(operation, &payload, &correlation_id)
            .instrument(span)
            .await;

        let label = match &result {
            Ok(Outcome::Success(_)) => "success",
            Ok(Outcome::Degraded { .. }) => "degraded",
            Err(_) => "rejected",
        };
        metrics::record_invocation(operation.name, label);
        result
    }

    async fn run(
        &self,
        operation: &'static Operation,
        payload: &Payload,
        correlation_id: &CorrelationId,
    ) -> Result<Outcome, GatewayError> {
        // Held until every attempt has reported back to the breaker.
        let permit = match self.breakers.for_operation(operation.name) {
            Some(b) => match b.try_acquire() {
                Some(permit) => Some(permit),
                None => {
                    tracing::info!(group = b.group(), "Circuit open, skipping upstream");
                    let reason = DegradeReason::CircuitOpen {
                        group: b.group().to_string(),
                    };
                    return Ok(self.degrade(operation, reason, correlation_id));
                }
            },
            None => None,
        };
        if permit.as_ref().is_some_and(BreakerPermit::is_probe) {
            tracing::info!("Dispatching half-open probe");
        }

        let result = self
            .retry
            .execute_gated(
                |ctx| self.attempt(operation, payload, correlation_id, permit.as_ref(), ctx),
                || permit.as_ref().map_or(true, BreakerPermit::may_continue),
            )
            .await;
        let group = permit.as_ref().map(|p| p.breaker().group().to_string());
        drop(permit);

        let err = match result {
            Ok(response) => return Ok(Outcome::Success(response)),
            Err(err) => err,
        };

        let reason = match err {
            RetryError::Aborted {
                last: UpstreamError::ClientError { status, body },
                ..
            } => {
                tracing::info!(status, "Upstream rejected the request");
                return Err(GatewayError::UpstreamRejected { status, body });
            }
            RetryError::Halted { .. } => DegradeReason::CircuitOpen {
                group: group.unwrap_or_else(|| operation.name.to_string()),
            },
            RetryError::Exhausted { attempts, last } => DegradeReason::RetriesExhausted { attempts, last },
            RetryError::Aborted { last, .. } => DegradeReason::UpstreamUnusable { error: last },
        };
        Ok(self.degrade(operation, reason, correlation_id))
    }

    /// One send, decoded, with its verdict reported through the permit.
    async fn attempt(
        &self,
        operation: &'static Operation,
        payload: &Payload,
        correlation_id: &CorrelationId,
        permit: Option<&BreakerPermit>,
        ctx: RetryContext,
    ) -> Result<OperationResponse, UpstreamError> {
        if ctx.is_retry() {
            tracing::debug!(attempt = ctx.attempt, max_attempts = ctx.max_attempts, "Re-sending payload");
        }

        let result = match self
            .upstream
            .send(operation, payload, correlation_id, self.read_timeout)
            .await
        {
            Ok(raw) => OperationResponse::decode(operation.schema, &raw.body, correlation_id)
                .map_err(|e| UpstreamError::MalformedBody(e.to_string())),
            Err(e) => Err(e),
        };

        if let Some(permit) = permit {
            match &result {
                Ok(_) => permit.record_success(),
                Err(e) if e.counts_against_breaker() => permit.record_failure(),
                Err(_) => {}
            }
        }
        result
    }

    fn degrade(&self, operation: &Operation, reason: DegradeReason, correlation_id: &CorrelationId) -> Outcome {
        let response = self.fallback.fallback(operation, &reason, correlation_id);
        Outcome::Degraded { response, reason }
    }
}

fn breakers_from_config(config: &GatewayConfig) -> BreakerRegistry {
    let mut registry = BreakerRegistry::new();
    for kind in OperationKind::ALL {
        let operation = kind.descriptor();
        if !operation.guarded {
            continue;
        }
        let group = match config.breaker.scope {
            BreakerScope::PerOperation => operation.name,
            BreakerScope::Shared => SHARED_GROUP,
        };
        registry.guard(operation.name, group, &config.breaker);
    }
    registry
}
