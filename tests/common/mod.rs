//! Shared fakes for live feed tests.
//!
//! `FakeFactory` plays a scripted sequence of open outcomes and records
//! when each open happened (on the paused tokio clock), what the client
//! wrote, and how many channels it closed.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use rtcc_feed::domain::message::DecodeError;
use rtcc_feed::ports::channel::{Channel, ChannelFactory, TransportError};
use rtcc_feed::ports::diagnostics::DiagnosticSink;

/// What the channel does after its scripted frames are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Then {
    /// Peer closes cleanly.
    Close,
    /// Transport error, then closure.
    Fail,
    /// Stay open until `FakeFactory::drop_live` or more frames arrive.
    Hold,
}

/// Outcome of one `open` call.
#[derive(Debug, Clone)]
pub enum Open {
    Refuse,
    Accept { frames: Vec<String>, then: Then },
    /// Never completes.
    Stall,
}

impl Open {
    pub fn accept_then_close() -> Self {
        Self::Accept { frames: vec![], then: Then::Close }
    }

    pub fn hold() -> Self {
        Self::Accept { frames: vec![], then: Then::Hold }
    }
}

#[derive(Default)]
struct Inner {
    script: VecDeque<Open>,
    opens: Vec<Instant>,
    sent: Vec<String>,
    closed: usize,
    live: Option<mpsc::UnboundedSender<Result<String, TransportError>>>,
}

/// Scripted `ChannelFactory`. Once the script runs out every open is refused.
#[derive(Clone, Default)]
pub struct FakeFactory {
    inner: Arc<Mutex<Inner>>,
}

impl FakeFactory {
    pub fn new(script: impl IntoIterator<Item = Open>) -> Self {
        let factory = Self::default();
        factory.inner.lock().unwrap().script = script.into_iter().collect();
        factory
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().unwrap().opens.len()
    }

    /// Offsets of every open from `start`, in milliseconds.
    pub fn open_offsets_ms(&self, start: Instant) -> Vec<u128> {
        self.inner
            .lock()
            .unwrap()
            .opens
            .iter()
            .map(|t| t.duration_since(start).as_millis())
            .collect()
    }

    pub fn sent(&self) -> Vec<String> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn closed_count(&self) -> usize {
        self.inner.lock().unwrap().closed
    }

    /// Push a frame to the currently held channel.
    pub fn push(&self, frame: &str) {
        if let Some(tx) = &self.inner.lock().unwrap().live {
            let _ = tx.send(Ok(frame.to_string()));
        }
    }

    /// Close the currently held channel from the server side.
    pub fn drop_live(&self) {
        self.inner.lock().unwrap().live = None;
    }
}

#[async_trait]
impl ChannelFactory for FakeFactory {
    async fn open(&self, url: &str) -> Result<Box<dyn Channel>, TransportError> {
        let outcome = {
            let mut inner = self.inner.lock().unwrap();
            inner.opens.push(Instant::now());
            inner.script.pop_front().unwrap_or(Open::Refuse)
        };

        match outcome {
            Open::Refuse => Err(TransportError::Connect {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
            Open::Stall => std::future::pending().await,
            Open::Accept { frames, then } => {
                let (tx, rx) = mpsc::unbounded_channel();
                for frame in frames {
                    let _ = tx.send(Ok(frame));
                }
                match then {
                    Then::Close => drop(tx),
                    Then::Fail => {
                        let _ = tx.send(Err(TransportError::Read("connection reset".to_string())));
                    }
                    Then::Hold => self.inner.lock().unwrap().live = Some(tx),
                }
                Ok(Box::new(FakeChannel {
                    rx,
                    inner: Arc::clone(&self.inner),
                    failed: false,
                }))
            }
        }
    }
}

struct FakeChannel {
    rx: mpsc::UnboundedReceiver<Result<String, TransportError>>,
    inner: Arc<Mutex<Inner>>,
    failed: bool,
}

#[async_trait]
impl Channel for FakeChannel {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        if self.failed {
            return None;
        }
        let frame = self.rx.recv().await;
        if matches!(frame, Some(Err(_))) {
            self.failed = true;
        }
        frame
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.inner.lock().unwrap().sent.push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.inner.lock().unwrap().closed += 1;
    }
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Dropped { syntax: bool },
    Delivered(&'static str),
    Connected,
    Reconnect { attempt: u32, delay: Duration },
    Exhausted { attempts: u32 },
    Disconnected,
}

/// `DiagnosticSink` that records every call.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn reconnects(&self) -> Vec<(u32, Duration)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Reconnect { attempt, delay } => Some((attempt, delay)),
                _ => None,
            })
            .collect()
    }

    pub fn exhaustions(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Exhausted { .. }))
            .count()
    }

    pub fn dropped(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Dropped { .. }))
            .count()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl DiagnosticSink for RecordingSink {
    fn message_dropped(&self, _raw: &str, error: &DecodeError) {
        self.record(Event::Dropped { syntax: error.is_syntax() });
    }

    fn message_delivered(&self, kind: &'static str) {
        self.record(Event::Delivered(kind));
    }

    fn connected(&self, _url: &str) {
        self.record(Event::Connected);
    }

    fn reconnect_scheduled(&self, attempt: u32, delay: Duration) {
        self.record(Event::Reconnect { attempt, delay });
    }

    fn retries_exhausted(&self, attempts: u32) {
        self.record(Event::Exhausted { attempts });
    }

    fn disconnected(&self, _url: &str) {
        self.record(Event::Disconnected);
    }
}

pub const URL: &str = "ws://localhost:8000/ws/rtcc";

pub const INIT_FRAME: &str = r#"{"type":"init","incidents":[],"units":[],"traffic":[]}"#;

pub const UNIT_FRAME: &str = r#"{"type":"unit_updated","unit":{"id":"FD-001","type":"fire",
    "status":"responding","location":{"lat":38.8951,"lng":-77.0364},"description":"Fire Engine 1"}}"#;
