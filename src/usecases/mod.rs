//! Use Cases Layer - Application Logic
//!
//! Orchestrates domain logic with the market-data port to implement the
//! relay's workflows. Each use case is a self-contained component wired
//! together explicitly in `main`.
//!
//! Use cases:
//! - `CoinResolver`: term to ranked market snapshots
//! - `MarketCache`: TTL cache with stale fallback
//! - `BroadcastScheduler`: periodic single-flight top-coins fan-out
//! - `SessionRouter`: per-connection subscribe/search state machine
//! - `DetailAggregator`: coin metadata merged with price history
//! - `SuggestionService`: search autocomplete

pub mod broadcast_scheduler;
pub mod coin_resolver;
pub mod detail_aggregator;
pub mod market_cache;
pub mod session_router;
pub mod suggestions;

#[cfg(test)]
pub(crate) mod testing;

pub use broadcast_scheduler::{BroadcastScheduler, BroadcastState, CycleOutcome};
pub use coin_resolver::CoinResolver;
pub use detail_aggregator::{DetailAggregator, DetailError};
pub use market_cache::{CacheError, CoinList, MarketCache};
pub use session_router::SessionRouter;
pub use suggestions::SuggestionService;
