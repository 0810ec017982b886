//! CoinGecko Adapter - Upstream Market Data
//!
//! Implements `MarketDataProvider` over the CoinGecko v3 REST API:
//! markets, search, coin metadata and market charts.

pub mod client;
pub mod types;

pub use client::{CoinGeckoClient, CoinGeckoClientConfig};
