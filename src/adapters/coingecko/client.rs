//! CoinGecko HTTP Client - Rate-limited REST API Client
//!
//! Wraps reqwest with a concurrency cap, a client-side request budget and
//! the optional API key header for every CoinGecko REST call the service
//! makes. Requests are never retried here: the cache decides what a
//! failure means.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use super::types::{ErrorBody, MarketChartResponse, SearchResponse};
use crate::adapters::metrics::MetricsRegistry;
use crate::config::UpstreamConfig;
use crate::domain::coin::{CoinId, MarketSnapshot, PricePoint, SearchHit};
use crate::ports::market_data::{MarketDataProvider, UpstreamError};

/// Header carrying the optional provider API key.
const API_KEY_HEADER: &str = "x-cg-pro-api-key";

/// Price-change windows requested with every markets call.
const PRICE_CHANGE_WINDOWS: &str = "1h,24h,7d";

/// Configuration for the CoinGecko HTTP client.
#[derive(Debug, Clone)]
pub struct CoinGeckoClientConfig {
  /// Base URL for the REST API, without trailing slash.
  pub base_url: String,
  /// Optional API key.
  pub api_key: Option<String>,
  /// Request timeout.
  pub timeout: Duration,
  /// User-Agent header.
  pub user_agent: String,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Client-side request budget per minute.
  pub requests_per_minute: u32,
}

impl Default for CoinGeckoClientConfig {
  fn default() -> Self {
    Self::from(&UpstreamConfig::default())
  }
}

impl From<&UpstreamConfig> for CoinGeckoClientConfig {
  fn from(cfg: &UpstreamConfig) -> Self {
    Self {
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      api_key: cfg.api_key.clone(),
      timeout: cfg.timeout(),
      user_agent: cfg.user_agent.clone(),
      max_concurrent: cfg.max_concurrent,
      requests_per_minute: cfg.requests_per_minute,
    }
  }
}

/// Rate-limited HTTP client for the CoinGecko REST API.
pub struct CoinGeckoClient {
  /// Underlying HTTP client (timeout and default headers applied).
  http: Client,
  /// Client configuration.
  config: CoinGeckoClientConfig,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
  /// Request budget, smooths bursts below the provider's own limit.
  limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
  /// Upstream request metrics.
  metrics: Arc<MetricsRegistry>,
}

impl CoinGeckoClient {
  /// Create a new CoinGecko client.
  pub fn new(config: CoinGeckoClientConfig, metrics: Arc<MetricsRegistry>) -> Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
      USER_AGENT,
      HeaderValue::from_str(&config.user_agent).context("Invalid User-Agent header")?,
    );
    if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
      let mut value = HeaderValue::from_str(key).context("Invalid API key header")?;
      value.set_sensitive(true);
      headers.insert(API_KEY_HEADER, value);
    }

    let http = Client::builder()
      .timeout(config.timeout)
      .default_headers(headers)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    let per_minute = NonZeroU32::new(config.requests_per_minute)
      .context("requests_per_minute must be positive")?;
    let limiter = RateLimiter::direct(Quota::per_minute(per_minute));

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

    Ok(Self {
      http,
      config,
      semaphore,
      limiter,
      metrics,
    })
  }

  /// Issue one GET and decode the JSON body.
  ///
  /// `endpoint` is the metric label; `path` is appended to the base URL.
  /// The configured timeout bounds the whole call, including the wait for
  /// a concurrency permit and for request budget.
  async fn get_json<T: DeserializeOwned>(
    &self,
    endpoint: &'static str,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<T, UpstreamError> {
    let url = format!("{}{}", self.config.base_url, path);
    let started = Instant::now();
    let result = tokio::time::timeout(self.config.timeout, self.throttled_send(&url, query))
      .await
      .unwrap_or(Err(UpstreamError::Timeout));
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    let outcome = match &result {
      Ok(_) => "ok",
      Err(e) => e.kind(),
    };
    self.metrics.record_upstream(endpoint, outcome, elapsed_ms);

    match &result {
      Ok(_) => debug!(endpoint, elapsed_ms, "Upstream request completed"),
      Err(e) => warn!(endpoint, elapsed_ms, error = %e, "Upstream request failed"),
    }

    let body = result?;
    serde_json::from_str(&body).map_err(|e| UpstreamError::Malformed(e.to_string()))
  }

  /// Wait for a permit and for budget, then send.
  async fn throttled_send(
    &self,
    url: &str,
    query: &[(&str, String)],
  ) -> Result<String, UpstreamError> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .map_err(|_| UpstreamError::Transport("client shut down".to_string()))?;
    self.limiter.until_ready().await;
    self.send(url, query).await
  }

  /// Send the request and return the raw success body.
  async fn send(&self, url: &str, query: &[(&str, String)]) -> Result<String, UpstreamError> {
    let response = self
      .http
      .get(url)
      .query(query)
      .send()
      .await
      .map_err(map_transport_error)?;

    let status = response.status();
    let body = response.text().await.map_err(map_transport_error)?;
    if status.is_success() {
      return Ok(body);
    }

    let reason = status.canonical_reason().unwrap_or("Upstream error");
    let message = ErrorBody::message_from(&body, reason);
    if status == StatusCode::TOO_MANY_REQUESTS {
      Err(UpstreamError::RateLimited { message })
    } else {
      Err(UpstreamError::Http {
        status: status.as_u16(),
        message,
      })
    }
  }

  /// Shared query for both markets calls.
  fn markets_query(per_page: usize) -> Vec<(&'static str, String)> {
    vec![
      ("vs_currency", "usd".to_string()),
      ("order", "market_cap_desc".to_string()),
      ("per_page", per_page.to_string()),
      ("page", "1".to_string()),
      ("sparkline", "false".to_string()),
      ("price_change_percentage", PRICE_CHANGE_WINDOWS.to_string()),
    ]
  }

  /// Decode a markets body: a list of snapshots, anything else is empty.
  fn decode_markets(body: Value) -> Result<Vec<MarketSnapshot>, UpstreamError> {
    match body {
      Value::Array(_) => {
        serde_json::from_value(body).map_err(|e| UpstreamError::Malformed(e.to_string()))
      }
      other => {
        warn!(kind = json_kind(&other), "Markets response is not a list, treating as empty");
        Ok(Vec::new())
      }
    }
  }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoClient {
  #[instrument(skip(self))]
  async fn top_markets(&self, per_page: usize) -> Result<Vec<MarketSnapshot>, UpstreamError> {
    let body: Value = self
      .get_json("markets", "/coins/markets", &Self::markets_query(per_page))
      .await?;
    Self::decode_markets(body)
  }

  #[instrument(skip(self), fields(count = ids.len()))]
  async fn markets_for_ids(&self, ids: &[CoinId]) -> Result<Vec<MarketSnapshot>, UpstreamError> {
    let mut query = Self::markets_query(ids.len());
    query.push(("ids", ids.join(",")));
    let body: Value = self.get_json("markets", "/coins/markets", &query).await?;
    Self::decode_markets(body)
  }

  #[instrument(skip(self))]
  async fn search(&self, query: &str) -> Result<Vec<SearchHit>, UpstreamError> {
    let resp: SearchResponse = self
      .get_json("search", "/search", &[("query", query.to_string())])
      .await?;
    Ok(resp.coins)
  }

  #[instrument(skip(self))]
  async fn coin(&self, id: &str) -> Result<Map<String, Value>, UpstreamError> {
    let query = [
      ("localization", "false".to_string()),
      ("tickers", "false".to_string()),
      ("market_data", "true".to_string()),
      ("community_data", "false".to_string()),
      ("developer_data", "false".to_string()),
      ("sparkline", "false".to_string()),
    ];
    let path = format!("/coins/{}", encode_path_segment(id));
    let body: Value = self.get_json("coin", &path, &query).await?;
    match body {
      Value::Object(map) => Ok(map),
      other => Err(UpstreamError::Malformed(format!(
        "coin payload is {}, expected object",
        json_kind(&other)
      ))),
    }
  }

  #[instrument(skip(self))]
  async fn market_chart(&self, id: &str, days: u32) -> Result<Vec<PricePoint>, UpstreamError> {
    let query = [("vs_currency", "usd".to_string()), ("days", days.to_string())];
    let path = format!("/coins/{}/market_chart", encode_path_segment(id));
    let chart: MarketChartResponse = self.get_json("market_chart", &path, &query).await?;
    Ok(chart.into_points())
  }

  fn provider_name(&self) -> &'static str {
    "coingecko"
  }
}

/// Classify a reqwest failure.
fn map_transport_error(e: reqwest::Error) -> UpstreamError {
  if e.is_timeout() {
    UpstreamError::Timeout
  } else {
    UpstreamError::Transport(e.to_string())
  }
}

/// Percent-encode a single path segment (coin ids are plain slugs, but
/// the detail route forwards user input).
fn encode_path_segment(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for b in raw.bytes() {
    match b {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
      _ => out.push_str(&format!("%{b:02X}")),
    }
  }
  out
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
