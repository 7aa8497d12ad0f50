//! HTTP server.
//!
//! Routes:
//!
//! - `GET /ws`: WebSocket upgrade
//! - `POST /events`: internal event ingestion
//! - `GET /health`: liveness and connection count
//! - `GET /metrics`: gateway counters

use axum::extract::{DefaultBodyLimit, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use refundly_sdk::DomainEvent;
use serde::Serialize;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::GatewayError;
use crate::state::AppState;
use crate::ws::{ws_handler, FanoutReport, WsMetricsSnapshot};

/// Header carrying the internal ingestion key.
pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

const MAX_EVENT_BODY: usize = 16 * 1024;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: &'static str,
    /// Registered connections.
    pub connections: usize,
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route(
            "/events",
            post(ingest_event).layer(DefaultBodyLimit::max(MAX_EVENT_BODY)),
        )
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn ingest_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<DomainEvent>,
) -> Result<Json<FanoutReport>, GatewayError> {
    let presented = headers
        .get(INTERNAL_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if !state.may_ingest(presented) {
        warn!(event = %event.kind(), "rejecting event with a bad internal key");
        return Err(GatewayError::Forbidden);
    }

    Ok(Json(state.gateway.emit(event).await))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: state.gateway.connection_count().await,
    })
}

async fn metrics(State(state): State<AppState>) -> Json<WsMetricsSnapshot> {
    Json(state.gateway.metrics().snapshot())
}

/// The gateway HTTP server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Creates a server.
    #[must_use]
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds and serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or serving fails.
    pub async fn run(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.addr()).await?;
        info!(addr = %listener.local_addr()?, "gateway listening");
        self.serve(listener).await
    }

    /// Serves on an already bound listener until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down gateway");
}
