//! Correlation identifiers.
//!
//! Every gateway invocation gets one id. It is attached to the invocation
//! span, so every log line of the call carries it, and it travels upstream
//! as the `X-Request-ID` header.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Opaque per-invocation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Issues correlation ids.
///
/// Clones share the issued-id counter.
#[derive(Debug, Clone, Default)]
pub struct CorrelationTracker {
    issued: Arc<AtomicU64>,
}

impl CorrelationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh id (UUID v4).
    pub fn new_id(&self) -> CorrelationId {
        self.issued.fetch_add(1, Ordering::Relaxed);
        CorrelationId(Uuid::new_v4().to_string())
    }

    /// Number of ids issued by this tracker and its clones.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}
