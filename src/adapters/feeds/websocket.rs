//! WebSocket Channel Adapter - tokio-tungstenite Transport
//!
//! Implements the `ChannelFactory`/`Channel` ports over a real
//! WebSocket so the live feed client can talk to the RTCC backend's
//! `/ws/rtcc` endpoint.
//!
//! Features:
//! - rustls for wss:// endpoints
//! - Ping/pong handled by tungstenite, never surfaced
//! - Binary frames accepted when they are valid UTF-8

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

use crate::ports::channel::{Channel, ChannelFactory, TransportError};

/// Opens WebSocket channels with `connect_async`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsChannelFactory;

impl WsChannelFactory {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelFactory for WsChannelFactory {
    #[instrument(skip(self))]
    async fn open(&self, url: &str) -> Result<Box<dyn Channel>, TransportError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WsChannel { stream }))
    }
}

/// One established WebSocket connection.
pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Channel for WsChannel {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => return Some(Ok(text)),
                    Err(e) => debug!(error = %e, "Skipping non-UTF-8 binary frame"),
                },
                Ok(Message::Ping(data)) => {
                    debug!(len = data.len(), "Feed ping received");
                }
                Ok(Message::Close(frame)) => {
                    debug!(frame = ?frame, "Feed close frame received");
                    return None;
                }
                Ok(Message::Pong(_) | Message::Frame(_)) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None;
                }
                Err(e) => return Some(Err(TransportError::Read(e.to_string()))),
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "Error while closing feed WebSocket");
        }
    }
}
