//! Coin Resolver - Term to Ranked Market Snapshots
//!
//! Turns a (normalized) search term into at most `limit` market snapshots:
//! 1. Empty term: top coins by market cap, one upstream call
//! 2. Otherwise: provider search, then markets for the hit ids, with
//!    search relevance reimposed on the result
//!
//! Upstream failures are returned as-is. Fallback belongs to the cache.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::coin::{
    collect_ranked_ids, rank_by_search_order, CacheKey, MarketSnapshot, DEFAULT_LIMIT,
};
use crate::ports::market_data::{MarketDataProvider, UpstreamError};

/// Resolves cache keys against the upstream provider.
pub struct CoinResolver {
    provider: Arc<dyn MarketDataProvider>,
    limit: usize,
}

impl CoinResolver {
    /// Resolver returning at most `DEFAULT_LIMIT` coins per query.
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            provider,
            limit: DEFAULT_LIMIT,
        }
    }

    /// Resolve a raw term. The term is trimmed and lower-cased first.
    pub async fn resolve(&self, term: &str) -> Result<Vec<MarketSnapshot>, UpstreamError> {
        self.resolve_key(&CacheKey::from_term(term)).await
    }

    /// Resolve an already-normalized key.
    #[instrument(skip(self, key), fields(provider = self.provider.provider_name(), key = %key))]
    pub async fn resolve_key(&self, key: &CacheKey) -> Result<Vec<MarketSnapshot>, UpstreamError> {
        match key {
            CacheKey::Top => {
                let mut coins = self.provider.top_markets(self.limit).await?;
                coins.truncate(self.limit);
                Ok(coins)
            }
            CacheKey::Search(term) => {
                let hits = self.provider.search(term).await?;
                let ids = collect_ranked_ids(&hits, self.limit);
                if ids.is_empty() {
                    debug!(term = %term, "Search returned no coin ids");
                    return Ok(Vec::new());
                }

                let snapshots = self.provider.markets_for_ids(&ids).await?;
                let ranked = rank_by_search_order(&ids, snapshots, self.limit);
                debug!(term = %term, requested = ids.len(), resolved = ranked.len(), "Search resolved");
                Ok(ranked)
            }
        }
    }
}
