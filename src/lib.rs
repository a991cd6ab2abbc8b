//! Resilient gateway between callers and an external media inference backend.

pub mod config;
pub mod gateway;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod upstream;

pub use config::GatewayConfig;
pub use gateway::{Gateway, GatewayError, OperationKind, Outcome};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
