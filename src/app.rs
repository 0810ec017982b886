//! Relay wiring.
//!
//! Builds every component from configuration and a market-data provider
//! and hands out the HTTP router. The binary and the end-to-end tests
//! share this so both run the same graph.

use std::sync::Arc;

use axum::Router;

use crate::adapters::metrics::{health_router, HealthState, MetricsRegistry};
use crate::adapters::server::{build_router, AppState};
use crate::config::AppConfig;
use crate::ports::MarketDataProvider;
use crate::usecases::{
    BroadcastScheduler, BroadcastState, CoinResolver, DetailAggregator, MarketCache,
    SessionRouter, SuggestionService,
};

/// Every long-lived component of the relay.
pub struct Relay {
    pub cache: Arc<MarketCache>,
    pub broadcast: Arc<BroadcastState>,
    pub router: Arc<SessionRouter>,
    pub scheduler: Arc<BroadcastScheduler>,
    pub metrics: Arc<MetricsRegistry>,
    state: Arc<AppState>,
}

impl Relay {
    /// Wire the component graph. Nothing is spawned yet.
    pub fn build(
        config: &AppConfig,
        provider: Arc<dyn MarketDataProvider>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let cache = Arc::new(MarketCache::new(
            CoinResolver::new(Arc::clone(&provider)),
            config.cache.ttl(),
            Arc::clone(&metrics),
        ));
        let broadcast = Arc::new(BroadcastState::new());
        let router = Arc::new(SessionRouter::new(
            Arc::clone(&cache),
            Arc::clone(&broadcast),
            config.cache.refresh_interval(),
            Arc::clone(&metrics),
        ));
        let scheduler = Arc::new(BroadcastScheduler::new(
            Arc::clone(&cache),
            Arc::clone(&broadcast),
            Arc::clone(&router),
            config.cache.refresh_interval(),
            Arc::clone(&metrics),
        ));

        let state = Arc::new(AppState {
            cache: Arc::clone(&cache),
            detail: Arc::new(DetailAggregator::new(Arc::clone(&provider))),
            suggestions: Arc::new(SuggestionService::new(
                provider,
                config.suggestions.min_query_len,
            )),
            router: Arc::clone(&router),
            mode: config.server.mode,
        });

        Self {
            cache,
            broadcast,
            router,
            scheduler,
            metrics,
            state,
        }
    }

    /// The full HTTP surface, including readiness and metrics.
    pub fn http_router(&self) -> Router {
        let health = health_router(HealthState::new(
            Arc::clone(&self.broadcast),
            Arc::clone(&self.metrics),
        ));
        build_router(Arc::clone(&self.state), health)
    }
}
