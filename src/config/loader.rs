//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    feed_url = %config.feed.url,
    api_url = %config.api.base_url,
    max_attempts = config.feed.max_attempts,
    base_delay_ms = config.feed.base_delay_ms,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty endpoints with the right scheme
/// - A retry budget of at least one attempt
/// - Positive delays and timeouts
fn validate_config(config: &AppConfig) -> Result<()> {
  // Feed validation
  let feed_url = config.feed.url.trim();
  anyhow::ensure!(!feed_url.is_empty(), "Feed URL must not be empty");
  anyhow::ensure!(
    feed_url.starts_with("ws://") || feed_url.starts_with("wss://"),
    "Feed URL must use ws:// or wss://, got {feed_url}"
  );
  anyhow::ensure!(
    config.feed.max_attempts >= 1,
    "feed.max_attempts must be at least 1, got {}",
    config.feed.max_attempts
  );
  anyhow::ensure!(
    config.feed.base_delay_ms > 0,
    "feed.base_delay_ms must be positive"
  );

  // API validation
  let api_url = config.api.base_url.trim();
  anyhow::ensure!(!api_url.is_empty(), "API base URL must not be empty");
  anyhow::ensure!(
    api_url.starts_with("http://") || api_url.starts_with("https://"),
    "API base URL must use http:// or https://, got {api_url}"
  );
  anyhow::ensure!(
    config.api.timeout_ms > 0,
    "api.timeout_ms must be positive"
  );

  Ok(())
}
