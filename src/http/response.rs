//! Response mapping.
//!
//! # Responsibilities
//! - Serialize mapped and degraded outcomes (both 200)
//! - Flag degraded responses with `x-gateway-degraded: true`
//! - Map gateway errors to status codes with a JSON body
//!
//! # Design Decisions
//! - A degraded response is still a well-formed answer, so it keeps 200
//! - Upstream 4xx statuses pass through unchanged

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::gateway::{GatewayError, Outcome};
use crate::http::request::X_GATEWAY_DEGRADED;

/// Envelope used by the health and status endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_body: Option<&'a str>,
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        let degraded = self.is_degraded();
        let mut response = Json(self.into_inner()).into_response();
        if degraded {
            response
                .headers_mut()
                .insert(X_GATEWAY_DEGRADED, HeaderValue::from_static("true"));
        }
        response
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::EmptyPayload | GatewayError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::UpstreamRejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
            }
        };
        let upstream_body = match &self {
            GatewayError::UpstreamRejected { body, .. } if !body.is_empty() => Some(body.as_str()),
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            error_message: self.to_string(),
            upstream_body,
        };
        (status, Json(body)).into_response()
    }
}
