//! Dashboard record types pushed by the RTCC backend.
//!
//! Mirrors the JSON the backend broadcasts for incidents, emergency
//! units, and traffic incidents. Enum variants serialize in lowercase /
//! snake_case exactly as the backend emits them.

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────
// Identifier aliases
// ────────────────────────────────────────────

/// Incident identifier (e.g. "INC-001").
pub type IncidentId = String;

/// Emergency unit identifier (e.g. "EMS-001").
pub type UnitId = String;

/// Traffic incident identifier (e.g. "TRAFFIC-001").
pub type TrafficId = String;

/// Geographic position in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    /// Whether both coordinates fall inside the valid WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

// ────────────────────────────────────────────
// Incidents
// ────────────────────────────────────────────

/// Kind of emergency an incident describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    Medical,
    Fire,
    Police,
    Traffic,
    Other,
}

/// Dispatch priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    #[default]
    Active,
    Pending,
    Resolved,
}

/// An emergency incident as broadcast by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    #[serde(rename = "type")]
    pub kind: IncidentKind,
    pub priority: Priority,
    #[serde(default)]
    pub status: IncidentStatus,
    pub location: Location,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Units currently attached to this incident.
    #[serde(default)]
    pub assigned_units: Vec<UnitId>,
    /// Creation time as emitted by the backend (naive ISO-8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Incident {
    pub fn is_active(&self) -> bool {
        self.status == IncidentStatus::Active
    }
}

/// Request body for creating an incident through the REST API.
///
/// The backend assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewIncident {
    #[serde(rename = "type")]
    pub kind: IncidentKind,
    pub priority: Priority,
    pub status: IncidentStatus,
    pub location: Location,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ────────────────────────────────────────────
// Emergency units
// ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Police,
    Fire,
    Ems,
    Traffic,
}

/// Operational status of an emergency unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    #[default]
    Available,
    Responding,
    Busy,
    Maintenance,
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Responding => write!(f, "responding"),
            Self::Busy => write!(f, "busy"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// An emergency unit (police car, engine, ambulance, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    #[serde(rename = "type")]
    pub kind: UnitKind,
    #[serde(default)]
    pub status: UnitStatus,
    pub location: Location,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_incident_id: Option<IncidentId>,
}

/// Body of `PUT /api/units/{id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitStatusUpdate {
    pub status: UnitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

// ────────────────────────────────────────────
// Traffic incidents
// ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficKind {
    Accident,
    Congestion,
    Construction,
    Weather,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A road traffic disruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficIncident {
    pub id: TrafficId,
    #[serde(rename = "type")]
    pub kind: TrafficKind,
    pub severity: Severity,
    pub location: Location,
    pub description: String,
    #[serde(default)]
    pub affected_roads: Vec<String>,
    /// Expected duration in minutes (1..=1440).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Request body for creating a traffic incident.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTrafficIncident {
    #[serde(rename = "type")]
    pub kind: TrafficKind,
    pub severity: Severity,
    pub location: Location,
    pub description: String,
    pub affected_roads: Vec<String>,
    pub estimated_duration: u32,
}

// ────────────────────────────────────────────
// Transit status (read-only WMATA queries)
// ────────────────────────────────────────────

/// A Metro rail incident, in WMATA's PascalCase wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetroIncident {
    #[serde(rename = "IncidentID")]
    pub incident_id: String,
    pub description: String,
    pub lines_affected: String,
    #[serde(default)]
    pub date_updated: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusStatus {
    InService,
    OutOfService,
    Delayed,
}

/// A bus position report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusPosition {
    pub id: String,
    pub route: String,
    pub location: Location,
    pub status: BusStatus,
    #[serde(default)]
    pub last_update: Option<String>,
}
