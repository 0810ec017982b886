//! Shared handler state.

use std::sync::Arc;

use crate::config::RunMode;
use crate::usecases::{DetailAggregator, MarketCache, SessionRouter, SuggestionService};

/// Components every HTTP and WebSocket handler can reach.
pub struct AppState {
    /// TTL cache behind `/api/coins`.
    pub cache: Arc<MarketCache>,
    /// Coin detail lookups.
    pub detail: Arc<DetailAggregator>,
    /// Autocomplete.
    pub suggestions: Arc<SuggestionService>,
    /// Real-time sessions.
    pub router: Arc<SessionRouter>,
    /// Deployment mode, echoed by the liveness route.
    pub mode: RunMode,
}
