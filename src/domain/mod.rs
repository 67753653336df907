//! Domain layer - Feed records, messages, and reconnect state.
//!
//! Pure types and logic with no IO (hexagonal architecture inner ring).
//! Everything here is testable without a socket or a runtime.

pub mod message;
pub mod reconnect;
pub mod records;

// Re-export core types for convenience
pub use message::{decode, DecodeError, FeedMessage};
pub use reconnect::{FeedState, ReconnectDecision, ReconnectMachine, RetryPolicy};
pub use records::{
    Incident, IncidentKind, IncidentStatus, Location, Priority, Severity,
    TrafficIncident, TrafficKind, Unit, UnitKind, UnitStatus,
};
