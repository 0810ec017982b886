//! Market Cache - TTL Cache with Stale Fallback
//!
//! Single process-wide table keyed by `CacheKey` in front of the coin
//! resolver:
//! - Live entry: returned with no upstream call
//! - Missing or expired: resolved, stored with `expires_at = now + ttl`
//! - Resolve failed but an older entry exists: that entry's data is
//!   returned unchanged and the entry is left as it was
//! - Resolve failed with no older entry: `CacheError::NoStaleDataAvailable`
//!
//! Concurrent misses for the same key share one resolve. Different keys
//! never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::coin_resolver::CoinResolver;
use crate::adapters::metrics::MetricsRegistry;
use crate::domain::coin::{CacheKey, MarketSnapshot};
use crate::ports::market_data::UpstreamError;

/// Shared, immutable list of snapshots as stored in the cache.
pub type CoinList = Arc<Vec<MarketSnapshot>>;

/// Cache lookup failure.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Refresh failed and there was nothing to fall back to.
    #[error("no cached data for {key}: {source}")]
    NoStaleDataAvailable {
        /// Display form of the cache key (`top`, `search:<term>`).
        key: String,
        /// The upstream failure that caused the miss.
        #[source]
        source: UpstreamError,
    },
}

impl CacheError {
    /// Underlying upstream failure.
    pub fn upstream(&self) -> &UpstreamError {
        match self {
            Self::NoStaleDataAvailable { source, .. } => source,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: CoinList,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// TTL cache of resolved coin lists.
pub struct MarketCache {
    resolver: CoinResolver,
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    /// Per-key refresh locks so concurrent misses coalesce.
    refresh_locks: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
    metrics: Arc<MetricsRegistry>,
}

impl MarketCache {
    /// Create an empty cache.
    pub fn new(resolver: CoinResolver, ttl: Duration, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            resolver,
            ttl,
            entries: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// Coins for a raw term (trimmed and lower-cased into a key).
    pub async fn get(&self, term: &str) -> Result<CoinList, CacheError> {
        self.get_key(CacheKey::from_term(term)).await
    }

    /// Coins for an already-normalized key.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn get_key(&self, key: CacheKey) -> Result<CoinList, CacheError> {
        if let Some(data) = self.live(&key).await {
            self.metrics.record_cache("hit");
            return Ok(data);
        }

        let lock = self.refresh_lock(&key);
        let _refreshing = lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(data) = self.live(&key).await {
            self.metrics.record_cache("hit");
            return Ok(data);
        }

        self.metrics.record_cache("miss");
        match self.resolver.resolve_key(&key).await {
            Ok(coins) => {
                let data: CoinList = Arc::new(coins);
                let entry = CacheEntry {
                    data: Arc::clone(&data),
                    expires_at: Instant::now() + self.ttl,
                };
                self.entries.write().await.insert(key.clone(), entry);
                debug!(count = data.len(), "Cache entry refreshed");
                Ok(data)
            }
            Err(source) => {
                let previous = self.entries.read().await.get(&key).cloned();
                match previous {
                    Some(entry) => {
                        self.metrics.record_cache("stale");
                        warn!(error = %source, count = entry.data.len(), "Refresh failed, serving stale data");
                        Ok(entry.data)
                    }
                    None => Err(CacheError::NoStaleDataAvailable {
                        key: key.to_string(),
                        source,
                    }),
                }
            }
        }
    }

    /// Number of keys currently held, live or expired.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing has ever been cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn live(&self, key: &CacheKey) -> Option<CoinList> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| Arc::clone(&entry.data))
    }

    fn refresh_lock(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(key.clone()).or_default())
    }
}
