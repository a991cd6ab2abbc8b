//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds >= 1)
//! - Check addresses and the upstream URL parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::schema::{BackoffStrategy, GatewayConfig};
use crate::resilience::RetryPolicy;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("'{}' is not a URL: {}", config.upstream.base_url, e),
        )),
    }

    if config.upstream.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("upstream.connect_timeout_ms", "must be greater than 0"));
    }
    if config.upstream.read_timeout_ms == 0 {
        errors.push(ValidationError::new("upstream.read_timeout_ms", "must be greater than 0"));
    }

    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("breaker.failure_threshold", "must be at least 1"));
    }
    if config.breaker.cool_down_ms == 0 {
        errors.push(ValidationError::new("breaker.cool_down_ms", "must be greater than 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    match config.retries.backoff {
        BackoffStrategy::Exponential => {
            if config.retries.base_delay_ms > config.retries.max_delay_ms {
                errors.push(ValidationError::new(
                    "retries.base_delay_ms",
                    "must not exceed retries.max_delay_ms",
                ));
            }
        }
        BackoffStrategy::Fixed => {
            if config.retries.schedule_ms.is_empty() {
                errors.push(ValidationError::new(
                    "retries.schedule_ms",
                    "fixed backoff needs at least one delay",
                ));
            }
        }
    }

    if config.health_check.enabled {
        if config.health_check.interval_secs == 0 {
            errors.push(ValidationError::new("health_check.interval_secs", "must be greater than 0"));
        }
        if config.health_check.unhealthy_threshold == 0 || config.health_check.healthy_threshold == 0 {
            errors.push(ValidationError::new("health_check", "thresholds must be at least 1"));
        }
        if !config.health_check.path.starts_with('/') {
            errors.push(ValidationError::new("health_check.path", "must start with '/'"));
        }
    }

    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::new("limits.max_body_size", "must be greater than 0"));
    }
    if config.limits.request_timeout_secs == 0 {
        errors.push(ValidationError::new("limits.request_timeout_secs", "must be greater than 0"));
    } else if config.upstream.read_timeout_ms > 0 && config.retries.max_attempts > 0 {
        // The request timeout must leave room for the degraded response.
        let budget = retry_budget(config);
        if Duration::from_secs(config.limits.request_timeout_secs) <= budget {
            errors.push(ValidationError::new(
                "limits.request_timeout_secs",
                format!(
                    "must exceed the worst-case retry budget of {} ms",
                    budget.as_millis()
                ),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Longest one invocation can spend on upstream attempts and backoff.
pub fn retry_budget(config: &GatewayConfig) -> Duration {
    RetryPolicy::from_config(&config.retries)
        .worst_case_duration(Duration::from_millis(config.upstream.read_timeout_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.upstream.base_url = "ftp://models".into();
        config.upstream.read_timeout_ms = 0;
        config.breaker.failure_threshold = 0;
        config.retries.max_attempts = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "upstream.base_url",
                "upstream.read_timeout_ms",
                "breaker.failure_threshold",
                "retries.max_attempts",
            ]
        );
    }

    #[test]
    fn test_fixed_backoff_requires_schedule() {
        let mut config = GatewayConfig::default();
        config.retries.backoff = BackoffStrategy::Fixed;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "retries.schedule_ms");

        config.retries.schedule_ms = vec![10];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_request_timeout_must_exceed_retry_budget() {
        let mut config = GatewayConfig::default();
        config.upstream.read_timeout_ms = 600;
        config.retries.max_attempts = 3;
        config.retries.backoff = BackoffStrategy::Fixed;
        config.retries.schedule_ms = vec![100];
        config.limits.request_timeout_secs = 1;
        assert_eq!(retry_budget(&config), Duration::from_millis(2_000));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "limits.request_timeout_secs");
        assert!(errors[0].message.contains("2000 ms"));

        // Exactly the budget is still too tight.
        config.limits.request_timeout_secs = 2;
        assert!(validate_config(&config).is_err());

        config.limits.request_timeout_secs = 3;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_disabled_retries_shrink_budget() {
        let mut config = GatewayConfig::default();
        config.upstream.read_timeout_ms = 600;
        config.retries.enabled = false;
        config.limits.request_timeout_secs = 1;
        assert_eq!(retry_budget(&config), Duration::from_millis(600));
        assert!(validate_config(&config).is_ok());
    }
}
