//! Diagnostic Sink Port - Operator Visibility for Feed Failures
//!
//! Failures the feed client contains (dropped payloads, scheduled
//! reconnects, retry exhaustion) are reported here instead of being
//! propagated to the caller.

use std::time::Duration;

use tracing::{info, warn};

use crate::domain::message::DecodeError;

/// Receives feed lifecycle diagnostics.
///
/// Implementations must be cheap and non-blocking: they run on the
/// feed driver task between channel events.
pub trait DiagnosticSink: Send + Sync + 'static {
    /// An inbound payload could not be decoded and was dropped.
    fn message_dropped(&self, raw: &str, error: &DecodeError);

    /// A message was decoded and handed to the caller.
    fn message_delivered(&self, kind: &'static str) {
        let _ = kind;
    }

    /// The channel opened.
    fn connected(&self, url: &str) {
        let _ = url;
    }

    /// The channel closed and retry `attempt` will run after `delay`.
    fn reconnect_scheduled(&self, attempt: u32, delay: Duration);

    /// The retry budget is spent; the client stopped for good.
    fn retries_exhausted(&self, attempts: u32);

    /// The owner disconnected (or dropped) the client.
    fn disconnected(&self, url: &str) {
        let _ = url;
    }
}

/// Default sink: structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn message_dropped(&self, raw: &str, error: &DecodeError) {
        warn!(
            error = %error,
            syntax = error.is_syntax(),
            len = raw.len(),
            "Dropping malformed feed message"
        );
    }

    fn connected(&self, url: &str) {
        info!(url = %url, "Live feed connected");
    }

    fn reconnect_scheduled(&self, attempt: u32, delay: Duration) {
        info!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Live feed closed, reconnect scheduled"
        );
    }

    fn retries_exhausted(&self, attempts: u32) {
        warn!(attempts, "Live feed reconnect attempts exhausted, giving up");
    }
}
