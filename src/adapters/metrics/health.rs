//! Health and Metrics Routes - Readiness Probe and Prometheus Scrape
//!
//! Exposes `/ready` and `/metrics` as an axum 0.7 router that the main
//! HTTP surface merges in. Readiness depends on the broadcast state
//! holding at least one successful top-coins fetch.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tracing::error;

use super::prometheus::MetricsRegistry;
use crate::usecases::broadcast_scheduler::BroadcastState;

/// Shared state polled by the probe and scrape handlers.
#[derive(Clone)]
pub struct HealthState {
    /// Broadcast state; ready once it holds data.
    pub broadcast: Arc<BroadcastState>,
    /// Metrics registry rendered on scrape.
    pub metrics: Arc<MetricsRegistry>,
}

impl HealthState {
    pub fn new(broadcast: Arc<BroadcastState>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { broadcast, metrics }
    }

    /// Check if the relay has live data to serve.
    pub fn is_ready(&self) -> bool {
        self.broadcast.has_data()
    }
}

/// Router serving `/ready` and `/metrics`.
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/ready", get(readiness))
        .route("/metrics", get(metrics))
        .with_state(Arc::new(state))
}

/// Readiness probe: 200 once the first broadcast succeeded, else 503.
async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

/// Prometheus text exposition.
async fn metrics(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
