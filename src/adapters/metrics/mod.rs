//! Metrics and Monitoring Adapters
//!
//! Provides the Prometheus registry shared by every component and the
//! `/ready` and `/metrics` routes merged into the main HTTP surface.

pub mod health;
pub mod prometheus;

pub use health::{health_router, HealthState};
pub use prometheus::MetricsRegistry;
