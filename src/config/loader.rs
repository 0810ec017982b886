//! Configuration Loader - File Loading, Env Overrides and Validation
//!
//! Handles loading `config.toml`, layering environment variables on top,
//! validating all parameters, and providing clear error messages for
//! misconfiguration.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use super::{AppConfig, RunMode};

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
  /// Read from this file.
  File(String),
  /// No file at this path; built-in defaults were used.
  Defaults(String),
}

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

  let mut config = parse_config(&content)?;
  apply_env_overrides(&mut config, &std::env::vars().collect())?;
  validate_config(&config)?;

  Ok(config)
}

/// Load `path` if it exists, else start from defaults.
///
/// Environment overrides and validation apply either way. A file that
/// exists but fails to parse is still an error. The returned source is
/// logged by the caller once tracing is up.
pub fn load_or_default(path: &str) -> Result<(AppConfig, ConfigSource)> {
  if Path::new(path).exists() {
    return Ok((load_config(path)?, ConfigSource::File(path.to_string())));
  }

  let mut config = AppConfig::default();
  apply_env_overrides(&mut config, &std::env::vars().collect())?;
  validate_config(&config)?;
  Ok((config, ConfigSource::Defaults(path.to_string())))
}

/// Parse TOML text into a config (no env, no validation).
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).context("Failed to parse config.toml")
}

/// Apply environment overrides from `env`.
///
/// Recognised keys: `BIND`, `PORT`, `APP_ENV`, `COINGECKO_BASE_URL`,
/// `COINGECKO_API_KEY`. Empty values are ignored.
pub fn apply_env_overrides(config: &mut AppConfig, env: &HashMap<String, String>) -> Result<()> {
  let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

  if let Some(bind) = get("BIND") {
    config.server.bind = bind.to_string();
  }
  if let Some(port) = get("PORT") {
    config.server.port = port
      .parse()
      .with_context(|| format!("PORT must be a valid port number, got {port:?}"))?;
  }
  if let Some(mode) = get("APP_ENV") {
    config.server.mode = RunMode::parse(mode)
      .with_context(|| format!("APP_ENV must be production or development, got {mode:?}"))?;
  }
  if let Some(url) = get("COINGECKO_BASE_URL") {
    config.upstream.base_url = url.trim_end_matches('/').to_string();
  }
  if let Some(key) = get("COINGECKO_API_KEY") {
    config.upstream.api_key = Some(key.to_string());
  }

  Ok(())
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Positive timeouts, budgets and cadences
/// - TTL strictly longer than the refresh cadence, so the stale path
///   only runs on upstream failure
/// - Non-empty upstream URL
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.upstream.base_url.is_empty(),
    "Upstream base_url must not be empty"
  );
  anyhow::ensure!(
    config.upstream.timeout_ms > 0,
    "Upstream timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.upstream.max_concurrent > 0,
    "Upstream max_concurrent must be positive"
  );
  anyhow::ensure!(
    config.upstream.requests_per_minute > 0,
    "Upstream requests_per_minute must be positive"
  );
  anyhow::ensure!(
    config.cache.refresh_interval_ms > 0,
    "Cache refresh_interval_ms must be positive"
  );
  anyhow::ensure!(
    config.cache.ttl_ms > config.cache.refresh_interval_ms,
    "Cache ttl_ms ({}) must exceed refresh_interval_ms ({})",
    config.cache.ttl_ms,
    config.cache.refresh_interval_ms
  );

  Ok(())
}
