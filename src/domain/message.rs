//! Inbound feed messages.
//!
//! The backend pushes JSON objects tagged by a `type` field. Anything
//! that does not decode into one of the known variants is a
//! `DecodeError` and gets dropped by the feed client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::records::{Incident, TrafficIncident, Unit};

/// A decoded push notification from the RTCC backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    /// Full snapshot sent on connect (and periodically as keep-alive).
    Init {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        incidents: Option<Vec<Incident>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        units: Option<Vec<Unit>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        traffic: Option<Vec<TrafficIncident>>,
    },
    IncidentCreated { incident: Incident },
    UnitUpdated { unit: Unit },
    /// The backend emits the record under `incident`; `traffic` is also accepted.
    TrafficIncidentCreated {
        #[serde(alias = "incident")]
        traffic: TrafficIncident,
    },
}

impl FeedMessage {
    /// Wire name of the message's `type` discriminator.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::IncidentCreated { .. } => "incident_created",
            Self::UnitUpdated { .. } => "unit_updated",
            Self::TrafficIncidentCreated { .. } => "traffic_incident_created",
        }
    }
}

/// Failure to turn an inbound payload into a `FeedMessage`.
#[derive(Debug, Error)]
#[error("malformed feed message: {source}")]
pub struct DecodeError {
    #[from]
    source: serde_json::Error,
}

impl DecodeError {
    /// True when the payload was not JSON at all (as opposed to JSON
    /// that does not match any known message shape).
    pub fn is_syntax(&self) -> bool {
        matches!(
            self.source.classify(),
            serde_json::error::Category::Syntax | serde_json::error::Category::Eof
        )
    }
}

/// Decode a text payload into a `FeedMessage`.
pub fn decode(text: &str) -> Result<FeedMessage, DecodeError> {
    Ok(serde_json::from_str(text)?)
}
