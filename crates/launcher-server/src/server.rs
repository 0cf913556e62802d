//! Launcher HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use launcher_core::{LauncherError, LauncherResult};
use runtime::SynthesisPipeline;

use crate::service::{generate_handler, gpu_info_handler};

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    /// Graceful shutdown timeout in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 6578)),
            shutdown_timeout_secs: 30,
        }
    }
}

/// Shared handler state.
pub struct AppState {
    pub pipeline: Arc<SynthesisPipeline>,
    pub metrics: Option<PrometheusHandle>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(pipeline: Arc<SynthesisPipeline>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            pipeline,
            metrics,
            start_time: Instant::now(),
        }
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    cache: &'static str,
}

/// Build the router with every endpoint.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/generate", post(generate_handler))
        .route("/gpu-info", get(gpu_info_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// The launcher server.
pub struct LauncherServer {
    settings: ServerSettings,
    state: Arc<AppState>,
}

impl LauncherServer {
    pub fn new(settings: ServerSettings, state: AppState) -> Self {
        Self {
            settings,
            state: Arc::new(state),
        }
    }

    /// Serve until SIGINT or SIGTERM.
    pub async fn run(self) -> LauncherResult<()> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let listener = tokio::net::TcpListener::bind(self.settings.addr).await?;
        let addr = listener.local_addr()?;
        let app = build_router(Arc::clone(&self.state));

        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.changed().await.ok();
                })
                .await
        });

        info!(
            %addr,
            cache = self.state.pipeline.cache().name(),
            "Launcher server started"
        );

        shutdown_signal().await;

        info!("Shutdown signal received, waiting for in-flight requests...");
        let _ = shutdown_tx.send(true);

        let timeout = Duration::from_secs(self.settings.shutdown_timeout_secs);
        match tokio::time::timeout(timeout, server).await {
            Err(_) => warn!("Shutdown timeout, forcing exit"),
            Ok(Err(join)) => {
                return Err(LauncherError::internal(format!("server task failed: {join}")));
            }
            Ok(Ok(result)) => {
                result?;
                info!("Server stopped gracefully");
            }
        }

        Ok(())
    }
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        cache: state.pipeline.cache().name(),
    })
}

/// Readiness check handler.
async fn ready_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Prometheus text exposition.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Wait for shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
