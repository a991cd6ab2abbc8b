//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (GATEWAY_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to the gateway and HTTP server at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breakers are wired from it at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::BackoffStrategy;
pub use schema::BreakerConfig;
pub use schema::BreakerScope;
pub use schema::GatewayConfig;
pub use schema::HealthCheckConfig;
pub use schema::RetryConfig;
pub use schema::UpstreamConfig;
