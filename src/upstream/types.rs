//! Upstream payloads, raw responses and failure taxonomy.

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::resilience::Retryable;

/// File name used when the caller did not supply one.
pub const DEFAULT_FILE_NAME: &str = "upload";

/// Binary media forwarded upstream.
///
/// Backed by [`Bytes`], so every retry attempt re-sends the same buffer.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    bytes: Bytes,
    file_name: Option<String>,
    content_type: Option<String>,
}

impl Payload {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            file_name: None,
            content_type: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A 2xx upstream response, body not yet decoded.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
    pub elapsed: Duration,
}

/// Failure of a single upstream attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// 4xx: the request itself was unacceptable.
    #[error("upstream rejected the request with status {status}")]
    ClientError { status: u16, body: String },

    /// 5xx (or any other non-success status).
    #[error("upstream server error (status {status})")]
    ServerError { status: u16 },

    #[error("upstream did not respond within {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Connection refused/reset, DNS, TLS and similar.
    #[error("transport failure: {0}")]
    Transport(String),

    /// 2xx whose body does not match the operation's schema.
    #[error("malformed upstream response: {0}")]
    MalformedBody(String),
}

impl UpstreamError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, UpstreamError::ClientError { .. })
    }

    /// Whether this failure signals upstream instability.
    pub fn counts_against_breaker(&self) -> bool {
        !self.is_client_error()
    }

    /// Short label for logs and metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            UpstreamError::ClientError { .. } => "client_error",
            UpstreamError::ServerError { .. } => "server_error",
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::MalformedBody(_) => "malformed_body",
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(timeout)
        } else if err.is_connect() {
            UpstreamError::Transport(format!("connect: {}", err))
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

impl Retryable for UpstreamError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpstreamError::ServerError { .. } | UpstreamError::Timeout(_) | UpstreamError::Transport(_)
        )
    }
}

/// Errors constructing the gateway or its upstream client.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("{0}")]
    Config(#[from] ConfigError),
}
