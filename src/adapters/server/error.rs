//! API error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::usecases::detail_aggregator::DetailError;

/// Failure of an HTTP handler, rendered as a JSON body.
#[derive(Debug)]
pub enum ApiError {
    /// 400 with `{"error": msg}`.
    BadRequest(String),
    /// 500 with the generic message, plus the upstream detail when known.
    Internal(Option<String>),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "bad_request: {msg}"),
            Self::Internal(Some(detail)) => write!(f, "internal_error: {detail}"),
            Self::Internal(None) => write!(f, "internal_error"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            Self::Internal(detail) => {
                let mut body = json!({
                    "status": 500,
                    "message": "Internal server error",
                });
                if let Some(detail) = detail {
                    body["error"] = json!(detail);
                }
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

impl From<DetailError> for ApiError {
    fn from(e: DetailError) -> Self {
        match e {
            DetailError::MissingId => Self::BadRequest(e.to_string()),
            DetailError::Upstream(_) => Self::Internal(Some(e.provider_message())),
        }
    }
}
