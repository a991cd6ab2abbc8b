//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::{BackoffStrategy, BreakerScope, GatewayConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {var}: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config = read_config_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Resolve the effective configuration: optional file, then process
/// environment overrides, then validation.
pub fn load(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay `GATEWAY_*` variables onto `config`.
///
/// `lookup` abstracts the environment so callers can supply any source.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("GATEWAY_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("GATEWAY_UPSTREAM_URL") {
        config.upstream.base_url = v;
    }
    if let Some(v) = lookup("GATEWAY_CONNECT_TIMEOUT_MS") {
        config.upstream.connect_timeout_ms = parse_var("GATEWAY_CONNECT_TIMEOUT_MS", v)?;
    }
    if let Some(v) = lookup("GATEWAY_READ_TIMEOUT_MS") {
        config.upstream.read_timeout_ms = parse_var("GATEWAY_READ_TIMEOUT_MS", v)?;
    }
    if let Some(v) = lookup("GATEWAY_FAILURE_THRESHOLD") {
        config.breaker.failure_threshold = parse_var("GATEWAY_FAILURE_THRESHOLD", v)?;
    }
    if let Some(v) = lookup("GATEWAY_COOL_DOWN_MS") {
        config.breaker.cool_down_ms = parse_var("GATEWAY_COOL_DOWN_MS", v)?;
    }
    if let Some(v) = lookup("GATEWAY_BREAKER_SCOPE") {
        config.breaker.scope = match v.as_str() {
            "per-operation" => BreakerScope::PerOperation,
            "shared" => BreakerScope::Shared,
            _ => {
                return Err(ConfigError::Env {
                    var: "GATEWAY_BREAKER_SCOPE",
                    value: v,
                    reason: "expected 'per-operation' or 'shared'".into(),
                })
            }
        };
    }
    if let Some(v) = lookup("GATEWAY_RETRY_MAX_ATTEMPTS") {
        config.retries.max_attempts = parse_var("GATEWAY_RETRY_MAX_ATTEMPTS", v)?;
    }
    if let Some(v) = lookup("GATEWAY_RETRY_BACKOFF_MS") {
        let mut schedule = Vec::new();
        for item in v.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            schedule.push(parse_var("GATEWAY_RETRY_BACKOFF_MS", item.to_string())?);
        }
        config.retries.backoff = BackoffStrategy::Fixed;
        config.retries.schedule_ms = schedule;
    }
    if let Some(v) = lookup("GATEWAY_LOG_LEVEL") {
        config.observability.log_level = v;
    }
    if let Some(v) = lookup("GATEWAY_METRICS_ADDRESS") {
        config.observability.metrics_address = v;
    }
    Ok(())
}

fn parse_var<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Env {
        var,
        reason: e.to_string(),
        value,
    })
}
