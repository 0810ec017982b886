//! Detail Aggregator - Coin Metadata plus Price History
//!
//! Fetches full coin metadata and the two-day market chart concurrently
//! and merges them into one `CoinDetail`. Either request failing fails the
//! whole lookup. Nothing here is cached.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use crate::domain::coin::CoinDetail;
use crate::ports::market_data::{MarketDataProvider, UpstreamError};

/// Days of chart history attached as `priceHistory24h`.
pub const HISTORY_DAYS: u32 = 2;

/// Detail lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetailError {
    /// Blank or missing coin id.
    #[error("Coin ID is required")]
    MissingId,

    /// One of the two upstream requests failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl DetailError {
    /// Provider-supplied message when there is one, else the error text.
    pub fn provider_message(&self) -> String {
        match self {
            Self::Upstream(
                UpstreamError::Http { message, .. } | UpstreamError::RateLimited { message },
            ) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Builds coin detail payloads from the provider.
pub struct DetailAggregator {
    provider: Arc<dyn MarketDataProvider>,
}

impl DetailAggregator {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }

    /// Metadata and chart for `id`, fetched concurrently.
    #[instrument(skip(self))]
    pub async fn get_detail(&self, id: &str) -> Result<CoinDetail, DetailError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(DetailError::MissingId);
        }

        let (metadata, history) = tokio::try_join!(
            self.provider.coin(id),
            self.provider.market_chart(id, HISTORY_DAYS)
        )?;

        Ok(CoinDetail::merge(metadata, history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::testing::FakeProvider;
    use serde_json::{json, Map, Value};

    fn metadata() -> Map<String, Value> {
        match json!({"id": "bitcoin", "name": "Bitcoin", "market_data": {"current_price": {"usd": 1.0}}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_merges_metadata_and_history() {
        let provider = FakeProvider::new();
        provider.set_coin(metadata());
        provider.set_chart(vec![(1, 10.0), (2, 11.0)]);
        let aggregator = DetailAggregator::new(provider.clone());

        let detail = aggregator.get_detail("bitcoin").await.unwrap();
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Bitcoin");
        assert_eq!(json["priceHistory24h"], json!([[1, 10.0], [2, 11.0]]));
        assert_eq!(provider.coin_calls(), 1);
        assert_eq!(provider.chart_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_history_is_empty_list() {
        let provider = FakeProvider::new();
        provider.set_coin(metadata());
        let aggregator = DetailAggregator::new(provider);

        let json = serde_json::to_value(aggregator.get_detail("bitcoin").await.unwrap()).unwrap();
        assert_eq!(json["priceHistory24h"], json!([]));
    }

    #[tokio::test]
    async fn test_blank_id_is_rejected_without_upstream_call() {
        let provider = FakeProvider::new();
        let aggregator = DetailAggregator::new(provider.clone());

        assert_eq!(aggregator.get_detail("  ").await, Err(DetailError::MissingId));
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_upstream_message_is_surfaced() {
        let provider = FakeProvider::new();
        provider.fail_with(Some(UpstreamError::Http {
            status: 404,
            message: "coin not found".into(),
        }));
        let aggregator = DetailAggregator::new(provider);

        let err = aggregator.get_detail("nope").await.unwrap_err();
        assert_eq!(err.provider_message(), "coin not found");
        assert_eq!(
            DetailError::Upstream(UpstreamError::Timeout).provider_message(),
            "upstream request timed out"
        );
        let limited = DetailError::Upstream(UpstreamError::RateLimited {
            message: "You've exceeded the Rate Limit".into(),
        });
        assert_eq!(limited.provider_message(), "You've exceeded the Rate Limit");
    }
}
