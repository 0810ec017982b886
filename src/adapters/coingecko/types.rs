//! CoinGecko API Response Types
//!
//! Wire shapes for the provider responses the client decodes beyond the
//! domain types themselves. Fields the service never reads are not
//! modelled.

use serde::Deserialize;

use crate::domain::coin::{PricePoint, SearchHit};

/// `/search` response. Only the coin hits are used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
  /// Coin hits in relevance order.
  #[serde(default)]
  pub coins: Vec<SearchHit>,
}

/// `/coins/{id}/market_chart` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketChartResponse {
  /// `[timestamp_ms, price]` pairs. Timestamps arrive as JSON numbers that
  /// may carry a fractional part.
  #[serde(default)]
  pub prices: Vec<(f64, f64)>,
}

impl MarketChartResponse {
  /// Convert the raw pairs into domain price points.
  pub fn into_points(self) -> Vec<PricePoint> {
    self
      .prices
      .into_iter()
      .map(|(ts, price)| (ts as i64, price))
      .collect()
  }
}

/// Error body shapes the provider uses.
///
/// Rate-limit and plan errors come as `{"status": {"error_message": ..}}`,
/// unknown coins as `{"error": ".."}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
  #[serde(default)]
  pub status: Option<ErrorStatus>,
  #[serde(default)]
  pub error: Option<String>,
}

/// Nested `status` object of an error body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorStatus {
  #[serde(default)]
  pub error_code: Option<i64>,
  #[serde(default)]
  pub error_message: Option<String>,
}

impl ErrorBody {
  /// Best human-readable message from a raw error body.
  ///
  /// Falls back to the raw text (or the status reason) when the body is not
  /// one of the known shapes.
  pub fn message_from(raw: &str, fallback: &str) -> String {
    let parsed: Option<ErrorBody> = serde_json::from_str(raw).ok();
    parsed
      .and_then(|body| {
        body
          .status
          .and_then(|s| s.error_message)
          .or(body.error)
      })
      .filter(|m| !m.trim().is_empty())
      .unwrap_or_else(|| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
          fallback.to_string()
        } else {
          trimmed.chars().take(200).collect()
        }
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_message_from_status_object() {
    let raw = r#"{"status":{"error_code":429,"error_message":"You've exceeded the Rate Limit"}}"#;
    assert_eq!(
      ErrorBody::message_from(raw, "Too Many Requests"),
      "You've exceeded the Rate Limit"
    );
  }

  #[test]
  fn test_error_message_from_error_field() {
    assert_eq!(
      ErrorBody::message_from(r#"{"error":"coin not found"}"#, "Not Found"),
      "coin not found"
    );
  }

  #[test]
  fn test_error_message_falls_back() {
    assert_eq!(ErrorBody::message_from("", "Bad Gateway"), "Bad Gateway");
    assert_eq!(ErrorBody::message_from("upstream down", "Bad Gateway"), "upstream down");
  }

  #[test]
  fn test_market_chart_points() {
    let chart: MarketChartResponse =
      serde_json::from_str(r#"{"prices":[[1700000000000,37000.5],[1700000300000.0,37010.0]]}"#)
        .unwrap();
    assert_eq!(
      chart.into_points(),
      vec![(1_700_000_000_000, 37000.5), (1_700_000_300_000, 37010.0)]
    );

    let empty: MarketChartResponse = serde_json::from_str("{}").unwrap();
    assert!(empty.into_points().is_empty());
  }

  #[test]
  fn test_search_response_tolerates_missing_coins() {
    let resp: SearchResponse = serde_json::from_str(r#"{"exchanges":[]}"#).unwrap();
    assert!(resp.coins.is_empty());
  }
}
