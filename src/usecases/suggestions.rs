//! Suggestions - Search Autocomplete
//!
//! Maps provider search hits to `SuggestionEntry` values. This path never
//! fails towards the caller: short queries and upstream errors both
//! produce an empty list.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::coin::{SuggestionEntry, DEFAULT_LIMIT};
use crate::ports::market_data::MarketDataProvider;

/// Autocomplete over the provider's search endpoint. Uncached.
pub struct SuggestionService {
    provider: Arc<dyn MarketDataProvider>,
    min_query_len: usize,
    limit: usize,
}

impl SuggestionService {
    pub fn new(provider: Arc<dyn MarketDataProvider>, min_query_len: usize) -> Self {
        Self {
            provider,
            min_query_len,
            limit: DEFAULT_LIMIT,
        }
    }

    /// Up to ten suggestions for `query`, in provider relevance order.
    pub async fn suggest(&self, query: &str) -> Vec<SuggestionEntry> {
        let query = query.trim();
        if query.chars().count() < self.min_query_len {
            return Vec::new();
        }

        match self.provider.search(query).await {
            Ok(hits) => {
                let entries: Vec<SuggestionEntry> = hits
                    .into_iter()
                    .filter(|h| !h.id.is_empty())
                    .take(self.limit)
                    .map(SuggestionEntry::from)
                    .collect();
                debug!(query, count = entries.len(), "Suggestions resolved");
                entries
            }
            Err(e) => {
                warn!(query, error = %e, "Suggestion search failed, returning none");
                Vec::new()
            }
        }
    }
}
