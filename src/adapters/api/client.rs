//! RTCC HTTP Client - REST Access to the Dashboard Backend
//!
//! Wraps reqwest with retries and a concurrency limit for the
//! incident, unit, traffic, and transit-status endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::config::ApiConfig;
use crate::domain::records::{
    BusPosition, Incident, MetroIncident, NewIncident, NewTrafficIncident,
    TrafficIncident, Unit, UnitStatusUpdate,
};
use crate::ports::data_service::DataService;

/// REST client failure.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("API error {status} on {path}: {body}")]
    Status {
        path: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid response body from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request limiter closed")]
    LimiterClosed,
}

/// Configuration for the RTCC HTTP client.
#[derive(Debug, Clone)]
pub struct RtccClientConfig {
    /// Base URL for the backend API.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum concurrent requests.
    pub max_concurrent: usize,
    /// Maximum retries on transient errors.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub retry_base_delay: Duration,
}

impl Default for RtccClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(10),
            max_concurrent: 8,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(200),
        }
    }
}

impl From<&ApiConfig> for RtccClientConfig {
    fn from(config: &ApiConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            ..Self::default()
        }
    }
}

// List endpoints wrap their arrays in an object.

#[derive(Debug, Deserialize)]
struct IncidentList {
    incidents: Vec<Incident>,
}

#[derive(Debug, Deserialize)]
struct UnitList {
    units: Vec<Unit>,
}

/// `/api/traffic` reuses the `incidents` key.
#[derive(Debug, Deserialize)]
struct TrafficList {
    incidents: Vec<TrafficIncident>,
}

#[derive(Debug, Deserialize)]
struct MetroStatus {
    #[serde(rename = "Incidents", default)]
    incidents: Vec<MetroIncident>,
}

#[derive(Debug, Deserialize)]
struct BusList {
    buses: Vec<BusPosition>,
}

/// HTTP client for the RTCC backend.
pub struct RtccClient {
    /// Underlying HTTP client.
    http: Client,
    /// Client configuration.
    config: RtccClientConfig,
    /// Concurrency limiter.
    semaphore: Arc<Semaphore>,
}

impl RtccClient {
    /// Create a new client.
    pub fn new(config: RtccClientConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(ApiError::Build)?;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));

        Ok(Self {
            http,
            config,
            semaphore,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.http.get(self.url(path));
        let response = self.execute_with_retry(request, path).await?;
        Self::decode(response, path).await
    }

    /// POST `body` as JSON and decode the response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.url(path)).json(body);
        let response = self.execute_with_retry(request, path).await?;
        Self::decode(response, path).await
    }

    /// PUT `body` as JSON and decode the response.
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.put(self.url(path)).json(body);
        let response = self.execute_with_retry(request, path).await?;
        Self::decode(response, path).await
    }

    /// Check if the API is reachable.
    pub async fn health_check(&self) -> bool {
        self.get_json::<serde_json::Value>("/").await.is_ok()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, ApiError> {
        response.json::<T>().await.map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }

    /// Execute request with concurrency limiting and retries.
    ///
    /// Transport errors and 5xx responses are retried with exponential
    /// backoff; any other non-success status fails immediately.
    async fn execute_with_retry(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<Response, ApiError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ApiError::LimiterClosed)?;

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = retry_delay(self.config.retry_base_delay, attempt);
                debug!(attempt, delay_ms = delay.as_millis(), path, "Retrying request");
                sleep(delay).await;
            }

            // Bodies are always in-memory JSON, so cloning cannot fail.
            let Some(req) = request.try_clone() else {
                break;
            };

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let body = response.text().await.unwrap_or_default();
                    let error = ApiError::Status {
                        path: path.to_string(),
                        status,
                        body,
                    };
                    if status.is_server_error() {
                        warn!(status = %status, path, "Server error, retrying");
                        last_error = Some(error);
                        continue;
                    }
                    return Err(error);
                }
                Err(e) => {
                    warn!(error = %e, attempt, path, "Request failed");
                    last_error = Some(ApiError::Transport {
                        path: path.to_string(),
                        source: e,
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::Status {
            path: path.to_string(),
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "max retries exceeded".to_string(),
        }))
    }
}

/// Backoff before retry `attempt` (1-based): base, 2×base, 4×base, ...
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

#[async_trait]
impl DataService for RtccClient {
    #[instrument(skip(self))]
    async fn list_incidents(&self) -> anyhow::Result<Vec<Incident>> {
        let list: IncidentList = self.get_json("/api/incidents").await?;
        Ok(list.incidents)
    }

    #[instrument(skip(self, incident), fields(kind = ?incident.kind))]
    async fn create_incident(&self, incident: &NewIncident) -> anyhow::Result<Incident> {
        anyhow::ensure!(
            incident.location.is_valid(),
            "incident location out of range: {:?}",
            incident.location
        );
        Ok(self.post_json("/api/incidents", incident).await?)
    }

    #[instrument(skip(self))]
    async fn list_units(&self) -> anyhow::Result<Vec<Unit>> {
        let list: UnitList = self.get_json("/api/units").await?;
        Ok(list.units)
    }

    #[instrument(skip(self, update), fields(status = %update.status))]
    async fn update_unit_status(
        &self,
        unit_id: &str,
        update: &UnitStatusUpdate,
    ) -> anyhow::Result<Unit> {
        if let Some(location) = update.location {
            anyhow::ensure!(location.is_valid(), "unit location out of range: {location:?}");
        }
        let path = format!("/api/units/{unit_id}/status");
        Ok(self.put_json(&path, update).await?)
    }

    #[instrument(skip(self))]
    async fn list_traffic(&self) -> anyhow::Result<Vec<TrafficIncident>> {
        let list: TrafficList = self.get_json("/api/traffic").await?;
        Ok(list.incidents)
    }

    #[instrument(skip(self, incident), fields(kind = ?incident.kind))]
    async fn create_traffic_incident(
        &self,
        incident: &NewTrafficIncident,
    ) -> anyhow::Result<TrafficIncident> {
        anyhow::ensure!(
            incident.location.is_valid(),
            "traffic incident location out of range: {:?}",
            incident.location
        );
        Ok(self.post_json("/api/traffic", incident).await?)
    }

    #[instrument(skip(self))]
    async fn metro_status(&self) -> anyhow::Result<Vec<MetroIncident>> {
        let status: MetroStatus = self.get_json("/api/wmata/metro").await?;
        Ok(status.incidents)
    }

    #[instrument(skip(self))]
    async fn bus_positions(&self) -> anyhow::Result<Vec<BusPosition>> {
        let list: BusList = self.get_json("/api/wmata/bus").await?;
        Ok(list.buses)
    }
}
