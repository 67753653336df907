//! Data Service Port - Request/Response Access to the RTCC Backend
//!
//! The live feed only tells the dashboard that something changed; the
//! dashboard re-queries through this port when it needs full state.

use async_trait::async_trait;

use crate::domain::records::{
    BusPosition, Incident, MetroIncident, NewIncident, NewTrafficIncident,
    TrafficIncident, Unit, UnitStatusUpdate,
};

/// Backend REST operations consumed by the dashboard.
#[async_trait]
pub trait DataService: Send + Sync + 'static {
    /// All incidents currently known to the backend.
    async fn list_incidents(&self) -> anyhow::Result<Vec<Incident>>;

    /// Create an incident; the backend assigns its id and broadcasts
    /// `incident_created` to every feed subscriber.
    async fn create_incident(&self, incident: &NewIncident) -> anyhow::Result<Incident>;

    async fn list_units(&self) -> anyhow::Result<Vec<Unit>>;

    /// Change a unit's status (and optionally its position).
    async fn update_unit_status(
        &self,
        unit_id: &str,
        update: &UnitStatusUpdate,
    ) -> anyhow::Result<Unit>;

    async fn list_traffic(&self) -> anyhow::Result<Vec<TrafficIncident>>;

    async fn create_traffic_incident(
        &self,
        incident: &NewTrafficIncident,
    ) -> anyhow::Result<TrafficIncident>;

    /// Metro rail incidents (read-only transit status).
    async fn metro_status(&self) -> anyhow::Result<Vec<MetroIncident>>;

    /// Bus positions (read-only transit status).
    async fn bus_positions(&self) -> anyhow::Result<Vec<BusPosition>>;
}
