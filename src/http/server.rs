//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the operation and status handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Bind to the listener and drain on shutdown
//! - Spawn the upstream health monitor

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};
use crate::gateway::{Gateway, GatewayError, OperationKind, Outcome};
use crate::health::{HealthMonitor, HealthState, UpstreamHealth};
use crate::http::request::{correlation_id, read_upload};
use crate::http::response::ApiResponse;
use crate::lifecycle::Shutdown;
use crate::resilience::BreakerSnapshot;
use crate::upstream::{client, InitError};

const SERVICE_NAME: &str = "media-gateway";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub health: Arc<UpstreamHealth>,
    pub started_at: Instant,
}

/// Caller-facing HTTP server.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    gateway: Arc<Gateway>,
    health: Arc<UpstreamHealth>,
}

impl HttpServer {
    /// Create a server whose gateway talks to the configured upstream.
    ///
    /// The configuration is validated first, so a request timeout that
    /// would cut retrying short is refused here too.
    pub fn new(config: GatewayConfig) -> Result<Self, InitError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let gateway = Gateway::from_config(&config)?;
        Ok(Self::with_gateway(config, gateway))
    }

    pub fn with_gateway(config: GatewayConfig, gateway: Gateway) -> Self {
        let gateway = Arc::new(gateway);
        let health = Arc::new(UpstreamHealth::from_config(&config.health_check));

        let state = AppState {
            gateway: Arc::clone(&gateway),
            health: Arc::clone(&health),
            started_at: Instant::now(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            gateway,
            health,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let tracker = state.gateway.tracker().clone();
        Router::new()
            .route("/api/ai/license-plate/detect", post(license_plate))
            .route("/api/ai/detect", post(detect))
            .route("/api/ai/transcribe", post(transcribe))
            .route("/api/ai/remove-background", post(remove_background))
            .route("/api/ai/caption", post(caption))
            .route("/api/ai/health", get(ai_health))
            .route("/api/ai/breakers", get(breakers))
            .route("/api/health", get(health))
            .route("/api/health/ready", get(ready))
            .route("/api/health/live", get(live))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.limits.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.limits.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(tracker))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn health(&self) -> &Arc<UpstreamHealth> {
        &self.health
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        if self.config.health_check.enabled {
            let monitor = client::base_url(&self.config.upstream)
                .map_err(InitError::from)
                .and_then(|base| {
                    HealthMonitor::new(&base, self.config.health_check.clone(), Arc::clone(&self.health))
                });
            match monitor {
                Ok(monitor) => {
                    tokio::spawn(monitor.run(shutdown.subscribe()));
                }
                Err(e) => tracing::error!(error = %e, "Health monitor not started"),
            }
        }

        let mut stop = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn invoke(
    state: &AppState,
    kind: OperationKind,
    headers: &HeaderMap,
    multipart: Multipart,
) -> Result<Outcome, GatewayError> {
    let payload = read_upload(multipart).await?;
    let id = correlation_id(headers).unwrap_or_else(|| state.gateway.tracker().new_id());
    state.gateway.invoke_with_id(kind, payload, id).await
}

async fn license_plate(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Outcome, GatewayError> {
    invoke(&state, OperationKind::LicensePlate, &headers, multipart).await
}

async fn detect(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Outcome, GatewayError> {
    invoke(&state, OperationKind::Detect, &headers, multipart).await
}

async fn transcribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Outcome, GatewayError> {
    invoke(&state, OperationKind::Transcribe, &headers, multipart).await
}

async fn remove_background(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Outcome, GatewayError> {
    invoke(&state, OperationKind::RemoveBackground, &headers, multipart).await
}

async fn caption(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Outcome, GatewayError> {
    invoke(&state, OperationKind::Caption, &headers, multipart).await
}

async fn ai_health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn breakers(State(state): State<AppState>) -> ApiResponse<Vec<BreakerSnapshot>> {
    ApiResponse::ok(state.gateway.breakers().snapshot())
}

#[derive(Debug, Serialize)]
struct ServiceHealth {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

async fn health(State(state): State<AppState>) -> ApiResponse<ServiceHealth> {
    ApiResponse::ok(ServiceHealth {
        status: "UP",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize)]
struct Readiness {
    status: &'static str,
    upstream: HealthState,
}

async fn ready(State(state): State<AppState>) -> ApiResponse<Readiness> {
    let ready = state.health.is_ready();
    ApiResponse {
        success: ready,
        data: Readiness {
            status: if ready { "UP" } else { "DOWN" },
            upstream: state.health.state(),
        },
    }
}

async fn live() -> ApiResponse<Value> {
    ApiResponse::ok(json!({ "status": "UP" }))
}
