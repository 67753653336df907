//! Health Check Server - Liveness, Readiness, and Metrics
//!
//! Exposes /live, /ready and /metrics via axum 0.7. Readiness follows
//! the live feed: ready only while its channel is open.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument};

use super::prometheus::FeedMetrics;
use crate::domain::reconnect::FeedState;

/// State shared with the request handlers.
#[derive(Clone)]
pub struct HealthState {
    /// Live feed connection state.
    pub feed_state: watch::Receiver<FeedState>,
    /// Metrics rendered at /metrics.
    pub metrics: Arc<FeedMetrics>,
}

impl HealthState {
    /// Ready to serve fresh data only while the feed is open.
    pub fn is_ready(&self) -> bool {
        self.feed_state.borrow().is_open()
    }
}

/// Axum-based health and metrics HTTP server.
pub struct HealthServer {
    state: HealthState,
    bind_address: String,
}

impl HealthServer {
    pub fn new(state: HealthState, bind_address: impl Into<String>) -> Self {
        Self {
            state,
            bind_address: bind_address.into(),
        }
    }

    /// Build the router (exposed for in-process testing).
    pub fn router(state: HealthState) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/metrics", get(Self::metrics))
            .with_state(state)
    }

    /// Serve until the shutdown signal fires.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.bind_address))]
    pub async fn run(
        self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let app = Self::router(self.state);
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;

        info!("Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 only while the feed channel is open.
    async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
        if state.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    async fn metrics(State(state): State<HealthState>) -> impl IntoResponse {
        state.metrics.render()
    }
}
