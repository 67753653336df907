//! Dashboard Store - Local View of Incidents, Units, and Traffic
//!
//! Folds `FeedMessage`s into the collections the dashboard renders and
//! derives the summary counters shown in its header.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::domain::message::FeedMessage;
use crate::domain::records::{Incident, TrafficIncident, Unit, UnitStatus};
use crate::ports::data_service::DataService;

/// Header counters for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub active_incidents: usize,
    pub available_units: usize,
    pub responding_units: usize,
    pub traffic_issues: usize,
}

/// In-memory dashboard state fed by the live feed.
#[derive(Debug, Clone, Default)]
pub struct DashboardStore {
    incidents: Vec<Incident>,
    units: Vec<Unit>,
    traffic: Vec<TrafficIncident>,
    last_update: Option<DateTime<Utc>>,
}

impl DashboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one feed message.
    ///
    /// `init` replaces only the collections it carries; the `*_created`
    /// and `unit_updated` messages upsert by id so a replayed message
    /// never duplicates a row.
    pub fn apply(&mut self, message: FeedMessage) {
        match message {
            FeedMessage::Init {
                incidents,
                units,
                traffic,
            } => {
                if let Some(incidents) = incidents {
                    self.incidents = incidents;
                }
                if let Some(units) = units {
                    self.units = units;
                }
                if let Some(traffic) = traffic {
                    self.traffic = traffic;
                }
                debug!(
                    incidents = self.incidents.len(),
                    units = self.units.len(),
                    traffic = self.traffic.len(),
                    "Dashboard snapshot applied"
                );
            }
            FeedMessage::IncidentCreated { incident } => {
                upsert(&mut self.incidents, incident, |i| i.id.as_str());
            }
            FeedMessage::UnitUpdated { unit } => {
                upsert(&mut self.units, unit, |u| u.id.as_str());
            }
            FeedMessage::TrafficIncidentCreated { traffic } => {
                upsert(&mut self.traffic, traffic, |t| t.id.as_str());
            }
        }
        self.last_update = Some(Utc::now());
    }

    /// Re-query incidents, units, and traffic from the backend.
    ///
    /// Collections whose request fails keep their previous contents.
    /// Returns how many of the three requests failed.
    #[instrument(skip_all)]
    pub async fn refresh(&mut self, service: &dyn DataService) -> usize {
        let (incidents, units, traffic) = tokio::join!(
            service.list_incidents(),
            service.list_units(),
            service.list_traffic()
        );

        let mut failed = 0;
        let mut keep = |what: &str, err: anyhow::Error| {
            warn!(error = %err, what, "Dashboard refresh request failed");
            failed += 1;
        };
        let snapshot = FeedMessage::Init {
            incidents: incidents.map_err(|e| keep("incidents", e)).ok(),
            units: units.map_err(|e| keep("units", e)).ok(),
            traffic: traffic.map_err(|e| keep("traffic", e)).ok(),
        };
        self.apply(snapshot);
        failed
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn traffic(&self) -> &[TrafficIncident] {
        &self.traffic
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Wall-clock time of the last applied message.
    pub const fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn stats(&self) -> DashboardStats {
        let count_units = |status: UnitStatus| self.units.iter().filter(|u| u.status == status).count();
        DashboardStats {
            active_incidents: self.incidents.iter().filter(|i| i.is_active()).count(),
            available_units: count_units(UnitStatus::Available),
            responding_units: count_units(UnitStatus::Responding),
            traffic_issues: self.traffic.len(),
        }
    }
}

fn upsert<T>(items: &mut Vec<T>, item: T, id: impl Fn(&T) -> &str) {
    match items.iter().position(|existing| id(existing) == id(&item)) {
        Some(idx) => items[idx] = item,
        None => items.push(item),
    }
}
