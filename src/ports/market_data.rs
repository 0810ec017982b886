//! Market Data Port - Upstream Provider Interface
//!
//! Defines the trait the use cases need from the external market-data
//! provider, plus the error taxonomy every adapter maps its failures into.
//!
//! Key design decisions:
//! - Read-only, parameterized requests; no retries at this layer
//! - Failures are surfaced, never swallowed; fallback belongs to the cache
//! - Missing or non-list payloads decode to empty results, not errors

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::coin::{CoinId, MarketSnapshot, PricePoint, SearchHit};

/// Failure of a single upstream request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
  /// The request exceeded the configured timeout.
  #[error("upstream request timed out")]
  Timeout,

  /// Non-2xx response; `message` is the provider-supplied text when present.
  #[error("upstream returned HTTP {status}: {message}")]
  Http {
    /// HTTP status code.
    status: u16,
    /// Provider error message or raw body.
    message: String,
  },

  /// The provider answered 429; `message` is its error text when present.
  #[error("upstream rate limit exceeded: {message}")]
  RateLimited {
    /// Provider error message or the status reason.
    message: String,
  },

  /// Response body had an unexpected shape.
  #[error("malformed upstream response: {0}")]
  Malformed(String),

  /// Connection or I/O failure before a response was received.
  #[error("upstream transport error: {0}")]
  Transport(String),
}

impl UpstreamError {
  /// Short label for metrics and logs.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Timeout => "timeout",
      Self::Http { .. } => "http",
      Self::RateLimited { .. } => "rate_limited",
      Self::Malformed(_) => "malformed",
      Self::Transport(_) => "transport",
    }
  }
}

/// Trait for market-data providers (CoinGecko in production).
///
/// Every method is one upstream request. Implementors apply the request
/// timeout and any credentials; callers own caching and fallback.
#[async_trait]
pub trait MarketDataProvider: Send + Sync + 'static {
  /// Coins ordered by market cap descending, page 1, `per_page` entries.
  ///
  /// A missing or non-list body yields an empty vector.
  async fn top_markets(&self, per_page: usize) -> Result<Vec<MarketSnapshot>, UpstreamError>;

  /// Market data for exactly these ids, `per_page = ids.len()`.
  ///
  /// Response order is whatever the provider chooses.
  async fn markets_for_ids(&self, ids: &[CoinId]) -> Result<Vec<MarketSnapshot>, UpstreamError>;

  /// Free-text coin search, hits in relevance order.
  async fn search(&self, query: &str) -> Result<Vec<SearchHit>, UpstreamError>;

  /// Full coin metadata with tickers, community and developer data disabled.
  async fn coin(&self, id: &str) -> Result<Map<String, Value>, UpstreamError>;

  /// `[timestamp, price]` series covering the last `days` days.
  ///
  /// A missing `prices` field yields an empty vector.
  async fn market_chart(&self, id: &str, days: u32) -> Result<Vec<PricePoint>, UpstreamError>;

  /// Provider name for logs.
  fn provider_name(&self) -> &'static str;
}
