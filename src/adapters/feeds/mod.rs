//! Feed Transport Adapters - Real-time Push Channels
//!
//! Provides the WebSocket implementation of the channel port used by
//! the live feed client.

pub mod websocket;

pub use websocket::{WsChannel, WsChannelFactory};
