//! Channel Port - Persistent Duplex Connection Interface
//!
//! The live feed client never touches a socket directly. It asks a
//! `ChannelFactory` for a `Channel` and then reads text frames from it.
//! Production wires the tokio-tungstenite adapter; tests inject a fake.

use async_trait::async_trait;
use thiserror::Error;

/// Channel-level failure.
///
/// Always followed by closure of the channel; the feed client reports it
/// through the caller's error handler and reconnects from the close.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The channel could not be opened.
    #[error("failed to open channel to {url}: {reason}")]
    Connect { url: String, reason: String },
    /// Reading from an open channel failed.
    #[error("channel read failed: {0}")]
    Read(String),
    /// Writing to an open channel failed.
    #[error("channel write failed: {0}")]
    Write(String),
}

/// An established duplex text channel.
#[async_trait]
pub trait Channel: Send {
    /// Wait for the next inbound text frame.
    ///
    /// `None` means the peer closed the channel cleanly; `Some(Err(_))`
    /// is a transport failure after which the channel is unusable.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Write one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the channel. Errors during close are ignored.
    async fn close(&mut self);
}

/// Opens channels to an endpoint.
#[async_trait]
pub trait ChannelFactory: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<Box<dyn Channel>, TransportError>;
}
