//! Broadcast Scheduler - Periodic Top-Coins Fan-out
//!
//! Every refresh interval (and once at startup) the scheduler reads the
//! `top` key through the market cache and pushes the result to every
//! subscribed session. Cycles are single-flight: a tick that fires while
//! another cycle is still waiting on the upstream is a no-op.
//!
//! Failure handling never escapes the scheduler. With known-good data the
//! last list is pushed again; with none, every connection gets an error
//! event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use super::market_cache::{CoinList, MarketCache};
use super::session_router::SessionRouter;
use crate::adapters::metrics::MetricsRegistry;
use crate::domain::coin::CacheKey;
use crate::domain::session::ServerEvent;

/// Sent to every connection when a cycle fails before any data exists.
pub const LIVE_UPDATE_ERROR: &str = "Could not update live data. Retrying soon.";

/// Process-wide broadcast state.
///
/// Written only by the scheduler; read by new connections, the router's
/// fallback paths and the readiness probe.
#[derive(Debug, Default)]
pub struct BroadcastState {
    last_top_coins: RwLock<CoinList>,
    is_refreshing: AtomicBool,
}

/// Clears the in-flight flag when the cycle ends, however it ends.
#[derive(Debug)]
pub struct RefreshGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl BroadcastState {
    /// Empty state, as at process start.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the in-flight flag. `None` if a cycle is already running.
    pub fn try_begin(&self) -> Option<RefreshGuard<'_>> {
        self.is_refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard {
                flag: &self.is_refreshing,
            })
    }

    /// Whether a cycle is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.is_refreshing.load(Ordering::Acquire)
    }

    /// Last successfully fetched top coins (empty before the first success).
    pub fn latest(&self) -> CoinList {
        match self.last_top_coins.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Whether any top coins have been published yet.
    pub fn has_data(&self) -> bool {
        !self.latest().is_empty()
    }

    fn store(&self, coins: CoinList) {
        match self.last_top_coins.write() {
            Ok(mut guard) => *guard = coins,
            Err(poisoned) => *poisoned.into_inner() = coins,
        }
    }
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// New data fetched and pushed.
    Fresh,
    /// Fetch failed; last known-good data pushed again.
    Stale,
    /// Fetch failed with no data ever published; error pushed to everyone.
    Error,
    /// Another cycle was in flight.
    Skipped,
}

impl CycleOutcome {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

/// Drives the shared top-coins channel.
pub struct BroadcastScheduler {
    cache: Arc<MarketCache>,
    state: Arc<BroadcastState>,
    router: Arc<SessionRouter>,
    period: Duration,
    metrics: Arc<MetricsRegistry>,
}

impl BroadcastScheduler {
    /// Create a scheduler firing every `period`.
    pub fn new(
        cache: Arc<MarketCache>,
        state: Arc<BroadcastState>,
        router: Arc<SessionRouter>,
        period: Duration,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            cache,
            state,
            router,
            period,
            metrics,
        }
    }

    /// Run until the shutdown signal. The first tick fires immediately.
    ///
    /// Each tick runs on its own task so a slow upstream call cannot delay
    /// the timer; overlapping ticks are absorbed by the in-flight flag.
    #[instrument(skip_all, name = "broadcast_loop")]
    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_ms = self.period.as_millis() as u64, "Broadcast scheduler started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping broadcast scheduler");
                    break;
                }

                _ = ticker.tick() => {
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        this.tick().await;
                    });
                }
            }
        }
    }

    /// One broadcast cycle.
    pub async fn tick(&self) -> CycleOutcome {
        let outcome = match self.state.try_begin() {
            Some(_guard) => self.refresh().await,
            None => {
                debug!("Broadcast cycle already in flight, skipping tick");
                CycleOutcome::Skipped
            }
        };
        self.metrics.record_broadcast(outcome.as_str());
        outcome
    }

    async fn refresh(&self) -> CycleOutcome {
        match self.cache.get_key(CacheKey::Top).await {
            Ok(coins) => {
                self.state.store(Arc::clone(&coins));
                let delivered = self.router.publish_shared(&ServerEvent::CoinsData(coins));
                debug!(delivered, "Top coins broadcast");
                CycleOutcome::Fresh
            }
            // The cache answers from its own stale entry first, so this arm
            // only runs when the state holds data the cache does not.
            Err(e) if self.state.has_data() => {
                let delivered = self
                    .router
                    .publish_shared(&ServerEvent::CoinsData(self.state.latest()));
                error!(error = %e, delivered, "Broadcast refresh failed, re-sent last known data");
                CycleOutcome::Stale
            }
            Err(e) => {
                let delivered = self
                    .router
                    .publish_all(&ServerEvent::CoinsError(LIVE_UPDATE_ERROR.to_string()));
                error!(error = %e, delivered, "Broadcast refresh failed with no data to fall back to");
                CycleOutcome::Error
            }
        }
    }
}
