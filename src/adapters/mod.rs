//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP client, HTTP/WebSocket server). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `coingecko`: CoinGecko REST API client
//! - `metrics`: Prometheus metrics and readiness probe
//! - `server`: axum HTTP routes and the real-time WebSocket channel

pub mod coingecko;
pub mod metrics;
pub mod server;
