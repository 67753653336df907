//! Use Cases Layer - Feed Orchestration
//!
//! Drives the ports with domain logic:
//! - `live_feed`: reconnecting push-channel client
//! - `dashboard`: folds feed messages into dashboard state

pub mod dashboard;
pub mod live_feed;

pub use dashboard::{DashboardStats, DashboardStore};
pub use live_feed::{ErrorHandler, LiveFeedClient, MessageHandler};
