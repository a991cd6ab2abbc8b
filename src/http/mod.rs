//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (correlation id, multipart `file` extraction)
//!     → Gateway::invoke_with_id
//!     → response.rs (mapped / degraded / error → status + JSON)
//!     → Send to client (X-Request-ID echoed)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{X_GATEWAY_DEGRADED, X_REQUEST_ID};
pub use server::HttpServer;
