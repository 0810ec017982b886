//! Domain layer - Core market-data and session models.
//!
//! Pure types and helpers with no I/O (hexagonal architecture inner ring).
//! All types are serializable and testable in isolation.

pub mod coin;
pub mod session;

// Re-export core types for convenience
pub use coin::{
    CacheKey, CoinDetail, CoinId, DEFAULT_LIMIT, MarketSnapshot, PricePoint, SearchHit,
    SuggestionEntry,
};
pub use session::{ClientCommand, ConnectionId, ServerEvent, SessionState};
