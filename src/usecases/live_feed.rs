//! Live Feed Client - Reconnecting Push Channel Consumer
//!
//! Owns one channel to the backend's push endpoint, decodes every inbound
//! frame into a `FeedMessage`, hands it to the caller's handler, and
//! reopens the channel with linear backoff when it closes.
//!
//! Features:
//! - One driver task per `connect`; the backoff sleep lives inside it,
//!   so at most one reconnect is ever pending
//! - `disconnect` is terminal and cancels a pending reconnect
//! - `send` writes only while `Open`, silently dropping otherwise
//! - Malformed frames go to the `DiagnosticSink`, never to the caller
//! - Event-driven via tokio::select! (NEVER polling)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::FeedConfig;
use crate::domain::message::{self, FeedMessage};
use crate::domain::reconnect::{FeedState, ReconnectDecision, ReconnectMachine, RetryPolicy};
use crate::ports::channel::{Channel, ChannelFactory, TransportError};
use crate::ports::diagnostics::{DiagnosticSink, TracingSink};

/// Caller callback for decoded messages.
pub type MessageHandler = Box<dyn FnMut(FeedMessage) + Send + 'static>;

/// Caller callback for transport errors.
pub type ErrorHandler = Box<dyn FnMut(&TransportError) + Send + 'static>;

/// State shared between the client handle and its driver task.
struct Shared {
    state_tx: watch::Sender<FeedState>,
    /// Bumped on every connect/disconnect; stale drivers stop publishing.
    generation: AtomicU64,
}

/// Publishes state for one driver generation.
#[derive(Clone)]
struct StatePublisher {
    shared: Arc<Shared>,
    generation: u64,
}

impl StatePublisher {
    fn publish(&self, state: FeedState) {
        self.shared.state_tx.send_if_modified(|current| {
            if self.shared.generation.load(Ordering::Acquire) != self.generation
                || *current == state
            {
                return false;
            }
            *current = state;
            true
        });
    }
}

/// Why a driver is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    /// `disconnect` or drop: the client is done.
    Disconnect,
    /// A new `connect` took over.
    Replaced,
}

/// Handles to a running driver task.
struct Session {
    shutdown_tx: broadcast::Sender<StopReason>,
    outbound_tx: mpsc::UnboundedSender<String>,
    _handle: JoinHandle<()>,
}

/// Reconnecting client for the RTCC push feed.
///
/// Explicitly constructed and owned by its consumer; dropping the client
/// disconnects it.
pub struct LiveFeedClient {
    url: String,
    policy: RetryPolicy,
    factory: Arc<dyn ChannelFactory>,
    sink: Arc<dyn DiagnosticSink>,
    shared: Arc<Shared>,
    session: Option<Session>,
}

impl LiveFeedClient {
    /// Create an idle client for `url` with the default retry policy
    /// (5 attempts, 1000 ms base delay) and a `tracing` diagnostic sink.
    pub fn new(url: impl Into<String>, factory: Arc<dyn ChannelFactory>) -> Self {
        let (state_tx, _) = watch::channel(FeedState::Idle);
        Self {
            url: url.into(),
            policy: RetryPolicy::default(),
            factory,
            sink: Arc::new(TracingSink),
            shared: Arc::new(Shared {
                state_tx,
                generation: AtomicU64::new(0),
            }),
            session: None,
        }
    }

    /// Create a client from the `[feed]` config section.
    pub fn from_config(config: &FeedConfig, factory: Arc<dyn ChannelFactory>) -> Self {
        Self::new(config.url.clone(), factory).with_policy(config.retry_policy())
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Current connection state.
    pub fn state(&self) -> FeedState {
        *self.shared.state_tx.borrow()
    }

    /// Receiver notified on every state transition.
    pub fn watch_state(&self) -> watch::Receiver<FeedState> {
        self.shared.state_tx.subscribe()
    }

    /// Open the channel and start delivering messages to `on_message`.
    ///
    /// Returns immediately; the connection runs on a spawned task, so
    /// this must be called from within a Tokio runtime. A session that
    /// is already running is replaced, and the retry budget starts fresh.
    pub fn connect<F>(&mut self, on_message: F, on_error: Option<ErrorHandler>)
    where
        F: FnMut(FeedMessage) + Send + 'static,
    {
        if self.session.is_some() {
            debug!(url = %self.url, "Replacing running live feed session");
            self.stop_session(StopReason::Replaced);
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            url: self.url.clone(),
            machine: ReconnectMachine::new(self.policy),
            factory: Arc::clone(&self.factory),
            sink: Arc::clone(&self.sink),
            publisher: StatePublisher {
                shared: Arc::clone(&self.shared),
                generation,
            },
            on_message: Box::new(on_message),
            on_error,
            outbound_rx,
            shutdown_rx,
        };
        driver.publisher.publish(FeedState::Connecting);

        let handle = tokio::spawn(driver.run());
        self.session = Some(Session {
            shutdown_tx,
            outbound_tx,
            _handle: handle,
        });
    }

    /// Close the channel and stop for good, cancelling any pending
    /// reconnect. Calling it again has no effect.
    pub fn disconnect(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.stop_session(StopReason::Disconnect);
        info!(url = %self.url, "Live feed disconnected");
    }

    /// Serialize `message` and write it to the channel if it is `Open`.
    ///
    /// In any other state the call does nothing; callers are not
    /// expected to queue.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) {
        let Some(session) = &self.session else {
            return;
        };
        if !self.state().is_open() {
            debug!(state = %self.state(), "Live feed not open, dropping outbound message");
            return;
        }
        match serde_json::to_string(message) {
            Ok(text) => {
                let _ = session.outbound_tx.send(text);
            }
            Err(e) => warn!(error = %e, "Failed to serialize outbound feed message"),
        }
    }

    fn stop_session(&mut self, reason: StopReason) {
        if let Some(session) = self.session.take() {
            // Stale driver stops publishing before we write the final state.
            self.shared.generation.fetch_add(1, Ordering::AcqRel);
            let _ = session.shutdown_tx.send(reason);
            self.shared.state_tx.send_replace(FeedState::Closed {
                retry_pending: false,
            });
        }
    }
}

impl Drop for LiveFeedClient {
    fn drop(&mut self) {
        self.stop_session(StopReason::Disconnect);
    }
}

impl std::fmt::Debug for LiveFeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveFeedClient")
            .field("url", &self.url)
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// How a single open channel ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Peer closed or transport failed; apply the retry policy.
    Closed,
    /// Owner stopped the driver.
    Shutdown(StopReason),
}

/// Runs the state machine for one `connect` call.
struct Driver {
    url: String,
    machine: ReconnectMachine,
    factory: Arc<dyn ChannelFactory>,
    sink: Arc<dyn DiagnosticSink>,
    publisher: StatePublisher,
    on_message: MessageHandler,
    on_error: Option<ErrorHandler>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    shutdown_rx: broadcast::Receiver<StopReason>,
}

impl Driver {
    #[instrument(name = "live_feed", skip(self), fields(url = %self.url))]
    async fn run(mut self) {
        loop {
            self.machine.on_connecting();
            self.publisher.publish(self.machine.state());

            let opened = tokio::select! {
                biased;
                reason = self.shutdown_rx.recv() => return self.stop(stop_reason(reason)),
                res = self.factory.open(&self.url) => res,
            };

            match opened {
                Ok(mut channel) => {
                    self.machine.on_open();
                    self.publisher.publish(self.machine.state());
                    self.sink.connected(&self.url);

                    if let SessionEnd::Shutdown(reason) = self.stream(channel.as_mut()).await {
                        channel.close().await;
                        return self.stop(reason);
                    }
                }
                Err(e) => self.report_error(&e),
            }

            self.discard_outbound();

            match self.machine.on_close() {
                ReconnectDecision::Retry { attempt, delay } => {
                    self.publisher.publish(self.machine.state());
                    self.sink.reconnect_scheduled(attempt, delay);
                    tokio::select! {
                        biased;
                        reason = self.shutdown_rx.recv() => return self.stop(stop_reason(reason)),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                ReconnectDecision::Exhausted { attempts } => {
                    self.publisher.publish(self.machine.state());
                    self.sink.retries_exhausted(attempts);
                    return;
                }
            }
        }
    }

    /// Pump one open channel until it closes or shutdown arrives.
    async fn stream(&mut self, channel: &mut dyn Channel) -> SessionEnd {
        loop {
            tokio::select! {
                biased;
                reason = self.shutdown_rx.recv() => {
                    return SessionEnd::Shutdown(stop_reason(reason));
                }
                Some(text) = self.outbound_rx.recv() => {
                    if let Err(e) = channel.send(text).await {
                        self.report_error(&e);
                        return SessionEnd::Closed;
                    }
                }
                frame = channel.recv() => match frame {
                    Some(Ok(text)) => self.dispatch(&text),
                    Some(Err(e)) => {
                        self.report_error(&e);
                        return SessionEnd::Closed;
                    }
                    None => {
                        debug!("Live feed channel closed by peer");
                        return SessionEnd::Closed;
                    }
                },
            }
        }
    }

    fn dispatch(&mut self, text: &str) {
        match message::decode(text) {
            Ok(msg) => {
                self.sink.message_delivered(msg.kind());
                (self.on_message)(msg);
            }
            Err(e) => self.sink.message_dropped(text, &e),
        }
    }

    fn report_error(&mut self, error: &TransportError) {
        warn!(error = %error, "Live feed transport error");
        if let Some(on_error) = self.on_error.as_mut() {
            on_error(error);
        }
    }

    /// Outbound frames never outlive the session they were sent in.
    fn discard_outbound(&mut self) {
        let mut dropped = 0usize;
        while self.outbound_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "Discarded outbound frames from closed session");
        }
    }

    fn stop(&mut self, reason: StopReason) {
        self.machine.on_disconnect();
        self.publisher.publish(self.machine.state());
        // A replaced driver's successor owns the connection status now.
        if reason == StopReason::Disconnect {
            self.sink.disconnected(&self.url);
        }
        debug!(reason = ?reason, "Live feed driver stopped");
    }
}

/// A closed shutdown channel means the client handle is gone.
fn stop_reason(received: Result<StopReason, broadcast::error::RecvError>) -> StopReason {
    received.unwrap_or(StopReason::Disconnect)
}
