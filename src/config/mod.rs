//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from an optional `config.toml` with
//! environment variable overrides. Every field has a default, so the
//! service runs with no file at all. Secrets (the provider API key) only
//! ever come from the environment.

pub mod loader;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// HTTP listener and runtime mode.
  pub server: ServerConfig,
  /// Upstream market-data provider.
  pub upstream: UpstreamConfig,
  /// Market cache and refresh cadence.
  pub cache: CacheConfig,
  /// Autocomplete endpoint.
  pub suggestions: SuggestionsConfig,
}

/// Deployment mode.
///
/// Production logs JSON lines; development logs human-readable text. The
/// browser client also uses it to pick push vs polling transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
  Production,
  #[default]
  Development,
}

impl RunMode {
  /// Parse `production` / `development` (case-insensitive).
  pub fn parse(value: &str) -> Option<Self> {
    match value.trim().to_ascii_lowercase().as_str() {
      "production" | "prod" => Some(Self::Production),
      "development" | "dev" => Some(Self::Development),
      _ => None,
    }
  }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Bind address.
  pub bind: String,
  /// Listener port.
  pub port: u16,
  /// Deployment mode.
  pub mode: RunMode,
  /// Log level (trace, debug, info, warn, error) when RUST_LOG is unset.
  pub log_level: String,
}

/// Upstream provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
  /// Provider REST base URL.
  pub base_url: String,
  /// Optional API key, sent as `x-cg-pro-api-key`. Env only.
  #[serde(skip)]
  pub api_key: Option<String>,
  /// Per-request timeout (milliseconds).
  pub timeout_ms: u64,
  /// User-Agent header.
  pub user_agent: String,
  /// Maximum in-flight requests.
  pub max_concurrent: usize,
  /// Client-side request budget per minute.
  pub requests_per_minute: u32,
}

/// Cache and scheduler timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Entry time-to-live (milliseconds). Must exceed the refresh interval.
  pub ttl_ms: u64,
  /// Broadcast and private polling cadence (milliseconds).
  pub refresh_interval_ms: u64,
}

/// Autocomplete configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuggestionsConfig {
  /// Queries shorter than this return no suggestions.
  pub min_query_len: usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind: "0.0.0.0".to_string(),
      port: 3001,
      mode: RunMode::default(),
      log_level: "info".to_string(),
    }
  }
}

impl Default for UpstreamConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.coingecko.com/api/v3".to_string(),
      api_key: None,
      timeout_ms: 12_000,
      user_agent: "CryptoPulse/1.0".to_string(),
      max_concurrent: 8,
      requests_per_minute: 30,
    }
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_ms: 25_000,
      refresh_interval_ms: 20_000,
    }
  }
}

impl Default for SuggestionsConfig {
  fn default() -> Self {
    Self { min_query_len: 2 }
  }
}

impl UpstreamConfig {
  /// Request timeout as a `Duration`.
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }
}

impl CacheConfig {
  /// Entry time-to-live as a `Duration`.
  pub fn ttl(&self) -> Duration {
    Duration::from_millis(self.ttl_ms)
  }

  /// Refresh cadence as a `Duration`.
  pub fn refresh_interval(&self) -> Duration {
    Duration::from_millis(self.refresh_interval_ms)
  }
}
