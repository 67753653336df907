//! RTCC Live Feed - Entry Point
//!
//! Connects to the RTCC backend's push feed, keeps a local dashboard
//! view up to date, and serves health/metrics. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create FeedMetrics (Prometheus + diagnostic sink)
//! 4. Seed the DashboardStore from the REST API
//! 5. Spawn health server (/live + /ready + /metrics)
//! 6. Spawn the store task fed by the live feed handler
//! 7. Connect the LiveFeedClient (auto-reconnect WebSocket)
//! 8. Wait for SIGINT → disconnect → drain → exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, instrument, warn};

use rtcc_feed::adapters::api::{RtccClient, RtccClientConfig};
use rtcc_feed::adapters::feeds::WsChannelFactory;
use rtcc_feed::adapters::metrics::{FeedMetrics, HealthServer, HealthState};
use rtcc_feed::config;
use rtcc_feed::domain::message::FeedMessage;
use rtcc_feed::ports::channel::TransportError;
use rtcc_feed::ports::diagnostics::DiagnosticSink;
use rtcc_feed::usecases::{DashboardStore, LiveFeedClient};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.app.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.app.name,
        version = env!("CARGO_PKG_VERSION"),
        feed = %config.feed.url,
        api = %config.api.base_url,
        "Starting RTCC live feed"
    );

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 3. Metrics double as the feed's diagnostic sink ─────
    let metrics = Arc::new(FeedMetrics::new().context("Failed to register metrics")?);

    // ── 4. Seed the dashboard from REST ─────────────────────
    let api = RtccClient::new(RtccClientConfig::from(&config.api))
        .context("Failed to create RTCC API client")?;
    let store = seed_store(&api).await;

    // ── 5. Feed client (owned here, dropped on exit) ────────
    let mut feed = LiveFeedClient::from_config(&config.feed, Arc::new(WsChannelFactory::new()))
        .with_sink(Arc::clone(&metrics) as Arc<dyn DiagnosticSink>);

    // ── 6. Health + metrics server ──────────────────────────
    let health_handle = if config.metrics.enabled {
        let server = HealthServer::new(
            HealthState {
                feed_state: feed.watch_state(),
                metrics: Arc::clone(&metrics),
            },
            config.metrics.bind_address.clone(),
        );
        let health_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(health_shutdown).await {
                error!(error = %e, "Health server failed");
            }
        }))
    } else {
        None
    };

    // ── 7. Store task + live feed ───────────────────────────
    let (msg_tx, msg_rx) = mpsc::unbounded_channel::<FeedMessage>();
    let store_handle = tokio::spawn(run_store(store, msg_rx, shutdown_tx.subscribe()));

    feed.connect(
        move |msg| {
            let _ = msg_tx.send(msg);
        },
        Some(Box::new(|e: &TransportError| warn!(error = %e, "Live feed transport error"))),
    );

    info!("Live feed running");

    // ── 8. Wait for SIGINT ──────────────────────────────────
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for SIGINT");
    }
    info!("SIGINT received, initiating graceful shutdown");

    feed.disconnect();
    let _ = shutdown_tx.send(());

    let _ = tokio::time::timeout(Duration::from_secs(5), store_handle).await;
    if let Some(handle) = health_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Fetch the current incidents, units, and traffic so the dashboard is
/// populated before the first `init` push arrives. An unreachable API
/// leaves it empty until the feed's `init`.
async fn seed_store(api: &RtccClient) -> DashboardStore {
    let mut store = DashboardStore::new();
    if !api.health_check().await {
        warn!(api = api.base_url(), "RTCC API unreachable, dashboard starts empty");
        return store;
    }
    let failed = store.refresh(api).await;

    let stats = store.stats();
    info!(
        failed_requests = failed,
        active_incidents = stats.active_incidents,
        available_units = stats.available_units,
        responding_units = stats.responding_units,
        traffic_issues = stats.traffic_issues,
        "Dashboard seeded from REST API"
    );
    store
}

/// Apply feed messages to the dashboard until shutdown.
#[instrument(skip_all)]
async fn run_store(
    mut store: DashboardStore,
    mut msg_rx: mpsc::UnboundedReceiver<FeedMessage>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                info!("Store task shutting down");
                return;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    info!("Live feed handler dropped");
                    return;
                };
                let kind = msg.kind();
                store.apply(msg);
                let stats = store.stats();
                info!(
                    kind,
                    active_incidents = stats.active_incidents,
                    available_units = stats.available_units,
                    responding_units = stats.responding_units,
                    traffic_issues = stats.traffic_issues,
                    "Dashboard updated"
                );
            }
        }
    }
}
