//! Active upstream health checking.
//!
//! # Responsibilities
//! - Periodically GET the upstream's health path
//! - Feed results into the readiness state

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;
use url::Url;

use crate::config::HealthCheckConfig;
use crate::health::state::UpstreamHealth;
use crate::upstream::InitError;

pub struct HealthMonitor {
    health: Arc<UpstreamHealth>,
    config: HealthCheckConfig,
    client: reqwest::Client,
    url: Url,
}

impl HealthMonitor {
    pub fn new(
        base_url: &Url,
        config: HealthCheckConfig,
        health: Arc<UpstreamHealth>,
    ) -> Result<Self, InitError> {
        let url = base_url.join(config.path.trim_start_matches('/'))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("media-gateway-health-check")
            .build()?;

        Ok(Self {
            health,
            config,
            client,
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            url = %self.url,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one check and record it. Returns whether it passed.
    pub async fn check_once(&self) -> bool {
        let healthy = match self.client.get(self.url.clone()).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(url = %self.url, status = %response.status(), "Health check failed: non-success status");
                false
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(url = %self.url, "Health check failed: timeout");
                false
            }
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Health check failed: connection error");
                false
            }
        };

        if healthy {
            self.health.mark_success();
        } else {
            self.health.mark_failure();
        }
        healthy
    }
}
