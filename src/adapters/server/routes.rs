//! HTTP Routes - REST Surface
//!
//! JSON endpoints over the cache, detail aggregator and suggestions, plus
//! liveness and the WebSocket upgrade. CORS is open to any origin.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, instrument};

use super::error::ApiError;
use super::state::AppState;
use super::ws::ws_handler;
use crate::domain::coin::{CoinDetail, SuggestionEntry};
use crate::usecases::CoinList;

/// `/api/coins?search=`.
#[derive(Debug, Default, Deserialize)]
pub struct CoinsQuery {
    #[serde(default)]
    pub search: Option<String>,
}

/// `/api/suggestions?q=`.
#[derive(Debug, Default, Deserialize)]
pub struct SuggestionsQuery {
    #[serde(default)]
    pub q: Option<String>,
}

/// Build the full application router.
///
/// `extra` is merged in as-is (readiness and metrics routes carry their
/// own state).
pub fn build_router(state: Arc<AppState>, extra: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(liveness))
        .route("/api", get(list_coins))
        .route("/api/coins", get(list_coins))
        .route("/api/coin", get(missing_coin_id))
        .route("/api/coin/", get(missing_coin_id))
        .route("/api/coin/:id", get(coin_detail))
        .route("/api/suggestions", get(suggestions))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .merge(extra)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn liveness(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "CryptoPulse API",
        "mode": state.mode,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[instrument(skip(state))]
async fn list_coins(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CoinsQuery>,
) -> Result<Json<CoinList>, ApiError> {
    let term = query.search.unwrap_or_default();
    state.cache.get(&term).await.map(Json).map_err(|e| {
        error!(error = %e, "Coin list request failed");
        ApiError::Internal(None)
    })
}

#[instrument(skip(state))]
async fn coin_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CoinDetail>, ApiError> {
    state.detail.get_detail(&id).await.map(Json).map_err(|e| {
        error!(error = %e, "Coin detail request failed");
        ApiError::from(e)
    })
}

async fn missing_coin_id() -> ApiError {
    ApiError::BadRequest("Coin ID is required".to_string())
}

async fn suggestions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SuggestionsQuery>,
) -> Json<Vec<SuggestionEntry>> {
    let q = query.q.unwrap_or_default();
    Json(state.suggestions.suggest(&q).await)
}
