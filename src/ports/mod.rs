//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `Channel`/`ChannelFactory`: persistent push connection
//! - `DiagnosticSink`: where contained feed failures are reported
//! - `DataService`: request/response access to the backend

pub mod channel;
pub mod data_service;
pub mod diagnostics;

pub use channel::{Channel, ChannelFactory, TransportError};
pub use data_service::DataService;
pub use diagnostics::{DiagnosticSink, TracingSink};
