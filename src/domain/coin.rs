//! Core market-data domain types.
//!
//! Defines the coin snapshots served to viewers, the autocomplete entries,
//! the merged coin detail payload, and the cache key derived from a search
//! term. Also holds the pure ranking helpers used by the coin resolver.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum number of coins returned for any query.
pub const DEFAULT_LIMIT: usize = 10;

// ────────────────────────────────────────────
// Type aliases consumed by ports and adapters
// ────────────────────────────────────────────

/// Stable provider identifier of a coin (e.g. `"bitcoin"`).
pub type CoinId = String;

/// One `[timestamp_ms, price]` sample of a market chart.
pub type PricePoint = (i64, f64);

// ────────────────────────────────────────────
// Market snapshots
// ────────────────────────────────────────────

/// One coin's market state as returned by the markets endpoint.
///
/// Immutable once fetched. The typed fields are the ones the service and
/// its viewers rely on; everything else the provider sends is carried
/// through untouched in `extra` so the browser sees the full payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Provider coin id.
    pub id: CoinId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Ticker symbol (lower-case as sent by the provider).
    #[serde(default)]
    pub symbol: String,
    /// Logo URL.
    #[serde(default)]
    pub image: String,
    /// Spot price in USD.
    #[serde(default)]
    pub current_price: Option<f64>,
    /// Market capitalization in USD.
    #[serde(default)]
    pub market_cap: Option<f64>,
    /// 24h traded volume in USD.
    #[serde(default)]
    pub total_volume: Option<f64>,
    /// Circulating supply in coin units.
    #[serde(default)]
    pub circulating_supply: Option<f64>,
    /// 24h price change percentage.
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    /// 1h price change percentage (USD).
    #[serde(default)]
    pub price_change_percentage_1h_in_currency: Option<f64>,
    /// 24h price change percentage (USD).
    #[serde(default)]
    pub price_change_percentage_24h_in_currency: Option<f64>,
    /// 7d price change percentage (USD).
    #[serde(default)]
    pub price_change_percentage_7d_in_currency: Option<f64>,
    /// Remaining provider fields, passed through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MarketSnapshot {
    /// Minimal snapshot with only identity fields set.
    pub fn new(id: impl Into<CoinId>, name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            symbol: symbol.into(),
            image: String::new(),
            current_price: None,
            market_cap: None,
            total_volume: None,
            circulating_supply: None,
            price_change_percentage_24h: None,
            price_change_percentage_1h_in_currency: None,
            price_change_percentage_24h_in_currency: None,
            price_change_percentage_7d_in_currency: None,
            extra: Map::new(),
        }
    }
}

// ────────────────────────────────────────────
// Search and suggestions
// ────────────────────────────────────────────

/// One coin hit from the provider's free-text search, in relevance order.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub id: CoinId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

/// Autocomplete entry derived per request from a search hit. Never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionEntry {
    pub id: CoinId,
    pub name: String,
    pub symbol: String,
    /// Small logo, falling back to the large one, else empty.
    pub image: String,
    /// Same URL as `image`; older clients read this key.
    pub thumb: String,
}

impl From<SearchHit> for SuggestionEntry {
    fn from(hit: SearchHit) -> Self {
        let image = hit
            .thumb
            .filter(|s| !s.is_empty())
            .or(hit.large.filter(|s| !s.is_empty()))
            .unwrap_or_default();

        Self {
            id: hit.id,
            name: hit.name,
            symbol: hit.symbol,
            thumb: image.clone(),
            image,
        }
    }
}

// ────────────────────────────────────────────
// Coin detail
// ────────────────────────────────────────────

/// Full provider coin payload with the short-term price history attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoinDetail {
    /// Provider metadata, spread at the top level of the JSON object.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
    /// Chart samples covering at most the last two days.
    #[serde(rename = "priceHistory24h")]
    pub price_history_24h: Vec<PricePoint>,
}

impl CoinDetail {
    /// Merge metadata with a price series. The series always wins over a
    /// provider field of the same name.
    pub fn merge(mut metadata: Map<String, Value>, price_history_24h: Vec<PricePoint>) -> Self {
        metadata.remove("priceHistory24h");
        Self {
            metadata,
            price_history_24h,
        }
    }
}

// ────────────────────────────────────────────
// Cache keys
// ────────────────────────────────────────────

/// Key of the single market cache table.
///
/// `Top` is the unfiltered market-cap ranking; `Search` holds a term that
/// has already been trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Top,
    Search(String),
}

impl CacheKey {
    /// Normalize a raw term (trim, lower-case) and derive its key.
    pub fn from_term(term: &str) -> Self {
        let normalized = term.trim().to_lowercase();
        if normalized.is_empty() {
            Self::Top
        } else {
            Self::Search(normalized)
        }
    }

    /// The normalized term, empty for `Top`.
    pub fn term(&self) -> &str {
        match self {
            Self::Top => "",
            Self::Search(term) => term,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::Search(term) => write!(f, "search:{term}"),
        }
    }
}

// ────────────────────────────────────────────
// Ranking
// ────────────────────────────────────────────

/// Collect coin ids from search hits: de-duplicated, first-seen order,
/// empty ids skipped, at most `limit`.
pub fn collect_ranked_ids(hits: &[SearchHit], limit: usize) -> Vec<CoinId> {
    let mut ids: Vec<CoinId> = Vec::with_capacity(limit.min(hits.len()));
    for hit in hits {
        if ids.len() == limit {
            break;
        }
        if hit.id.is_empty() || ids.contains(&hit.id) {
            continue;
        }
        ids.push(hit.id.clone());
    }
    ids
}

/// Reimpose search relevance on a markets response.
///
/// Keeps only snapshots whose id was requested, orders them by the id's
/// position in `ranked_ids` (provider order is ignored) and truncates to
/// `limit`.
pub fn rank_by_search_order(
    ranked_ids: &[CoinId],
    snapshots: Vec<MarketSnapshot>,
    limit: usize,
) -> Vec<MarketSnapshot> {
    let rank: HashMap<&str, usize> = ranked_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut kept: Vec<(usize, MarketSnapshot)> = snapshots
        .into_iter()
        .filter_map(|s| rank.get(s.id.as_str()).map(|&r| (r, s)))
        .collect();

    kept.sort_by_key(|(r, _)| *r);
    kept.truncate(limit);
    kept.into_iter().map(|(_, s)| s).collect()
}
