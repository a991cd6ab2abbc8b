//! Upstream inference backend subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway attempt
//!     → client.rs (multipart POST, X-Request-ID, response timeout)
//!     → types.rs (RawResponse on 2xx, UpstreamError otherwise)
//! ```
//!
//! # Design Decisions
//! - `Upstream` is a trait so the gateway can run against scripted transports
//! - 4xx is the caller's fault; 5xx, timeouts and transport errors are the upstream's
//! - The reqwest client (and its connection pool) is shared by clone

pub mod client;
pub mod types;

pub use client::{Upstream, UpstreamClient};
pub use types::{InitError, Payload, RawResponse, UpstreamError};
