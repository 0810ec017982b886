//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use cases require from the
//! outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `MarketDataProvider`: upstream market data and search

pub mod market_data;

pub use market_data::{MarketDataProvider, UpstreamError};
