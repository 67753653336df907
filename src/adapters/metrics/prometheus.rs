//! Prometheus Metrics Registry - Feed Observability
//!
//! Counts what the live feed delivers and drops, and tracks connection
//! status. Also acts as a `DiagnosticSink`, forwarding every event to
//! the tracing sink so logs and counters never disagree.

use std::time::Duration;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::domain::message::DecodeError;
use crate::ports::diagnostics::{DiagnosticSink, TracingSink};

/// Centralized Prometheus metrics for the live feed.
///
/// All metrics follow the naming convention `rtcc_feed_*`.
pub struct FeedMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Messages delivered to the handler, by message type.
    pub messages_delivered: IntCounterVec,
    /// Malformed messages dropped.
    pub messages_dropped: IntCounter,
    /// Reconnects scheduled.
    pub reconnects: IntCounter,
    /// Times the retry budget ran out.
    pub retries_exhausted: IntCounter,
    /// Feed connection status (1 = connected, 0 = not).
    pub connected: IntGauge,
    /// Log mirror.
    tracing: TracingSink,
}

impl FeedMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let messages_delivered = IntCounterVec::new(
            Opts::new(
                "rtcc_feed_messages_delivered_total",
                "Feed messages decoded and delivered",
            ),
            &["type"],
        )?;

        let messages_dropped = IntCounter::new(
            "rtcc_feed_messages_dropped_total",
            "Malformed feed messages dropped",
        )?;

        let reconnects = IntCounter::new(
            "rtcc_feed_reconnects_total",
            "Reconnect attempts scheduled",
        )?;

        let retries_exhausted = IntCounter::new(
            "rtcc_feed_retries_exhausted_total",
            "Times the reconnect budget was exhausted",
        )?;

        let connected = IntGauge::new(
            "rtcc_feed_connected",
            "Feed connection status (1=connected, 0=disconnected)",
        )?;

        // Register all metrics
        registry.register(Box::new(messages_delivered.clone()))?;
        registry.register(Box::new(messages_dropped.clone()))?;
        registry.register(Box::new(reconnects.clone()))?;
        registry.register(Box::new(retries_exhausted.clone()))?;
        registry.register(Box::new(connected.clone()))?;

        Ok(Self {
            registry,
            messages_delivered,
            messages_dropped,
            reconnects,
            retries_exhausted,
            connected,
            tracing: TracingSink,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl DiagnosticSink for FeedMetrics {
    fn message_dropped(&self, raw: &str, error: &DecodeError) {
        self.messages_dropped.inc();
        self.tracing.message_dropped(raw, error);
    }

    fn message_delivered(&self, kind: &'static str) {
        self.messages_delivered.with_label_values(&[kind]).inc();
    }

    fn connected(&self, url: &str) {
        self.connected.set(1);
        self.tracing.connected(url);
    }

    fn reconnect_scheduled(&self, attempt: u32, delay: Duration) {
        self.connected.set(0);
        self.reconnects.inc();
        self.tracing.reconnect_scheduled(attempt, delay);
    }

    fn retries_exhausted(&self, attempts: u32) {
        self.connected.set(0);
        self.retries_exhausted.inc();
        self.tracing.retries_exhausted(attempts);
    }

    fn disconnected(&self, _url: &str) {
        self.connected.set(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        let metrics = FeedMetrics::new().unwrap();
        metrics.message_delivered("init");
        metrics.message_delivered("init");
        metrics.reconnect_scheduled(1, Duration::from_millis(1000));
        metrics.retries_exhausted(5);

        let text = metrics.render();
        assert!(text.contains("rtcc_feed_messages_delivered_total{type=\"init\"} 2"));
        assert!(text.contains("rtcc_feed_reconnects_total 1"));
        assert!(text.contains("rtcc_feed_retries_exhausted_total 1"));
        assert!(text.contains("rtcc_feed_connected 0"));
    }

    #[test]
    fn test_drop_counted() {
        let metrics = FeedMetrics::new().unwrap();
        let err = crate::domain::message::decode("{").unwrap_err();
        metrics.message_dropped("{", &err);
        assert_eq!(metrics.messages_dropped.get(), 1);
    }

    #[test]
    fn test_disconnect_clears_connected_gauge() {
        let metrics = FeedMetrics::new().unwrap();
        metrics.connected("ws://localhost:8000/ws/rtcc");
        assert_eq!(metrics.connected.get(), 1);
        metrics.disconnected("ws://localhost:8000/ws/rtcc");
        assert_eq!(metrics.connected.get(), 0);
    }
}
