use thiserror::Error;

/// Failures surfaced to the caller instead of a degraded response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("payload is empty")]
    EmptyPayload,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("payload exceeds the configured size limit")]
    PayloadTooLarge,

    /// The upstream judged the request itself unacceptable (4xx).
    #[error("upstream rejected the request with status {status}")]
    UpstreamRejected { status: u16, body: String },
}
