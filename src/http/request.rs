//! Inbound request handling.
//!
//! # Responsibilities
//! - Stamp each request with a correlation id (reusing a caller-supplied
//!   `X-Request-ID`)
//! - Extract the uploaded `file` field into a [`Payload`]
//!
//! # Design Decisions
//! - The id is attached by the outermost layer so every log line and the
//!   upstream call share it

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::gateway::GatewayError;
use crate::observability::{CorrelationId, CorrelationTracker};
use crate::upstream::Payload;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Set on responses served by the fallback path.
pub const X_GATEWAY_DEGRADED: &str = "x-gateway-degraded";

/// Multipart field carrying the media.
pub const FILE_FIELD: &str = "file";

impl MakeRequestId for CorrelationTracker {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(self.new_id().as_str())
            .ok()
            .map(RequestId::new)
    }
}

/// Correlation id attached to the inbound request, if any.
pub fn correlation_id(headers: &HeaderMap) -> Option<CorrelationId> {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(CorrelationId::from)
}

/// Read the `file` field. Other fields are skipped.
pub async fn read_upload(mut multipart: Multipart) -> Result<Payload, GatewayError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let mut payload = Payload::new(bytes);
        if let Some(name) = file_name {
            payload = payload.with_file_name(name);
        }
        if let Some(content_type) = content_type {
            payload = payload.with_content_type(content_type);
        }
        return Ok(payload);
    }
    Err(GatewayError::InvalidPayload(format!("missing '{}' field", FILE_FIELD)))
}

fn multipart_error(err: MultipartError) -> GatewayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::PayloadTooLarge
    } else {
        GatewayError::InvalidPayload(err.body_text())
    }
}
