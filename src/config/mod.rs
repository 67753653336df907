//! Configuration Module - TOML-based Feed Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! Endpoints and retry parameters are externalized here - nothing
//! is hardcoded in the usecases layer.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::domain::reconnect::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

/// Top-level configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the feed starts.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Process identity and logging.
  #[serde(default)]
  pub app: AppSection,
  /// Push feed endpoint and retry budget.
  pub feed: FeedConfig,
  /// REST backend.
  pub api: ApiConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
  /// Human-readable instance name.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

impl Default for AppSection {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
    }
  }
}

/// Live feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// WebSocket endpoint (ws:// or wss://).
  pub url: String,
  /// Reconnect attempts before giving up.
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  /// Base reconnect delay; retry k waits k × this.
  #[serde(default = "default_base_delay_ms")]
  pub base_delay_ms: u64,
}

impl FeedConfig {
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
  }
}

/// REST API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Backend base URL (e.g. http://localhost:8000).
  pub base_url: String,
  /// Request timeout in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Retries on transport errors and 5xx responses.
  #[serde(default = "default_api_retries")]
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  #[serde(default = "default_retry_delay_ms")]
  pub retry_base_delay_ms: u64,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable the /metrics, /live and /ready server.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: default_true(),
      bind_address: default_metrics_addr(),
    }
  }
}

// Default value functions for serde

fn default_name() -> String {
  "rtcc-feed".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

const fn default_max_attempts() -> u32 {
  DEFAULT_MAX_ATTEMPTS
}

const fn default_base_delay_ms() -> u64 {
  1000
}

const fn default_timeout_ms() -> u64 {
  10_000
}

const fn default_api_retries() -> u32 {
  3
}

const fn default_retry_delay_ms() -> u64 {
  200
}

const fn default_true() -> bool {
  true
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}
