//! Multipart client for the inference backend.
//!
//! # Responsibilities
//! - POST the payload as a single `file` part to the operation's path
//! - Attach the correlation id as `X-Request-ID`
//! - Bound every attempt with a response timeout
//! - Classify the outcome (client error, server error, timeout, transport)
//! - Log and measure each attempt
//!
//! No retry or breaker logic lives here.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::UpstreamConfig;
use crate::gateway::operation::Operation;
use crate::http::X_REQUEST_ID;
use crate::observability::metrics;
use crate::observability::CorrelationId;
use crate::upstream::types::{InitError, Payload, RawResponse, UpstreamError, DEFAULT_FILE_NAME};

/// Longest slice of a 4xx body kept for the caller.
const MAX_ERROR_BODY: usize = 512;

/// Transport seam between the gateway and the backend.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Perform one attempt.
    async fn send(
        &self,
        operation: &Operation,
        payload: &Payload,
        correlation_id: &CorrelationId,
        timeout: Duration,
    ) -> Result<RawResponse, UpstreamError>;
}

/// reqwest-backed [`Upstream`].
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: Url,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, InitError> {
        let base_url = base_url(config)?;
        let mut headers = HeaderMap::new();
        headers.insert("x-request-source", HeaderValue::from_str(&config.request_source)?);

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .default_headers(headers)
            .build()?;

        tracing::info!(
            base_url = %base_url,
            connect_timeout_ms = config.connect_timeout_ms,
            read_timeout_ms = config.read_timeout_ms,
            "Upstream client initialized"
        );

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, operation: &Operation) -> Result<Url, UpstreamError> {
        self.base_url
            .join(operation.path.trim_start_matches('/'))
            .map_err(|e| UpstreamError::Transport(format!("invalid endpoint {}: {}", operation.path, e)))
    }

    async fn dispatch(
        &self,
        operation: &Operation,
        payload: &Payload,
        correlation_id: &CorrelationId,
        timeout: Duration,
    ) -> Result<(StatusCode, Bytes), UpstreamError> {
        let url = self.endpoint(operation)?;
        let form = Form::new().part("file", file_part(payload));
        let request = self
            .client
            .post(url)
            .header(X_REQUEST_ID, correlation_id.as_str())
            .multipart(form);

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        // On expiry the in-flight exchange is dropped; a late response is discarded.
        match tokio::time::timeout(timeout, exchange).await {
            Err(_) => Err(UpstreamError::Timeout(timeout)),
            Ok(Err(e)) => Err(UpstreamError::from_reqwest(e, timeout)),
            Ok(Ok((status, body))) => classify(status, body),
        }
    }
}

#[async_trait]
impl Upstream for UpstreamClient {
    async fn send(
        &self,
        operation: &Operation,
        payload: &Payload,
        correlation_id: &CorrelationId,
        timeout: Duration,
    ) -> Result<RawResponse, UpstreamError> {
        let started = Instant::now();
        let result = self.dispatch(operation, payload, correlation_id, timeout).await;
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        match &result {
            Ok((status, _)) => tracing::info!(
                correlation_id = %correlation_id,
                operation = operation.name,
                elapsed_ms,
                outcome = "ok",
                status = status.as_u16(),
                "Upstream call completed"
            ),
            Err(e) => tracing::warn!(
                correlation_id = %correlation_id,
                operation = operation.name,
                elapsed_ms,
                outcome = e.outcome_label(),
                error = %e,
                "Upstream call failed"
            ),
        }
        let outcome = result.as_ref().map_or_else(|e| e.outcome_label(), |_| "ok");
        metrics::record_upstream_attempt(operation.name, outcome, elapsed);

        result.map(|(status, body)| RawResponse {
            status: status.as_u16(),
            body,
            elapsed,
        })
    }
}

/// Configured base URL, normalised to end in `/` so operation paths join
/// below any path prefix.
pub fn base_url(config: &UpstreamConfig) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&config.base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn file_part(payload: &Payload) -> Part {
    let part = || {
        Part::bytes(payload.bytes().to_vec())
            .file_name(payload.file_name().unwrap_or(DEFAULT_FILE_NAME).to_string())
    };
    match payload.content_type() {
        // An unparseable content type is dropped rather than failing the call.
        Some(content_type) => part().mime_str(content_type).unwrap_or_else(|_| part()),
        None => part(),
    }
}

fn classify(status: StatusCode, body: Bytes) -> Result<(StatusCode, Bytes), UpstreamError> {
    if status.is_success() {
        return Ok((status, body));
    }
    if status.is_client_error() {
        let end = body.len().min(MAX_ERROR_BODY);
        return Err(UpstreamError::ClientError {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body[..end]).into_owned(),
        });
    }
    // 5xx, plus anything unexpected after redirects are followed.
    Err(UpstreamError::ServerError {
        status: status.as_u16(),
    })
}
