//! In-memory provider for use case tests.
//!
//! Scripted responses, per-method call counters, a switchable failure and
//! an optional artificial latency (advanced by paused tokio time).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::coin::{CoinId, MarketSnapshot, PricePoint, SearchHit};
use crate::ports::market_data::{MarketDataProvider, UpstreamError};

pub fn snapshot(id: &str) -> MarketSnapshot {
    MarketSnapshot::new(id, id.to_uppercase(), id)
}

pub fn hit(id: &str) -> SearchHit {
    SearchHit {
        id: id.to_string(),
        name: id.to_uppercase(),
        symbol: id.to_string(),
        thumb: Some(format!("https://img/{id}/thumb.png")),
        large: None,
    }
}

#[derive(Default)]
struct Script {
    top: Vec<MarketSnapshot>,
    searches: HashMap<String, Vec<SearchHit>>,
    markets: Vec<MarketSnapshot>,
    coin: Map<String, Value>,
    chart: Vec<PricePoint>,
    failure: Option<UpstreamError>,
    delay: Duration,
    last_market_ids: Vec<CoinId>,
}

#[derive(Default)]
pub struct FakeProvider {
    script: Mutex<Script>,
    top_calls: AtomicUsize,
    search_calls: AtomicUsize,
    markets_calls: AtomicUsize,
    coin_calls: AtomicUsize,
    chart_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_top(&self, coins: Vec<MarketSnapshot>) {
        self.script.lock().unwrap().top = coins;
    }

    pub fn set_search(&self, term: &str, hits: Vec<SearchHit>) {
        self.script
            .lock()
            .unwrap()
            .searches
            .insert(term.to_string(), hits);
    }

    /// Pool the markets call picks requested ids from, in pool order.
    pub fn set_markets(&self, coins: Vec<MarketSnapshot>) {
        self.script.lock().unwrap().markets = coins;
    }

    pub fn set_coin(&self, coin: Map<String, Value>) {
        self.script.lock().unwrap().coin = coin;
    }

    pub fn set_chart(&self, chart: Vec<PricePoint>) {
        self.script.lock().unwrap().chart = chart;
    }

    pub fn fail_with(&self, failure: Option<UpstreamError>) {
        self.script.lock().unwrap().failure = failure;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.script.lock().unwrap().delay = delay;
    }

    pub fn top_calls(&self) -> usize {
        self.top_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn markets_calls(&self) -> usize {
        self.markets_calls.load(Ordering::SeqCst)
    }

    pub fn coin_calls(&self) -> usize {
        self.coin_calls.load(Ordering::SeqCst)
    }

    pub fn chart_calls(&self) -> usize {
        self.chart_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.top_calls()
            + self.search_calls()
            + self.markets_calls()
            + self.coin_calls()
            + self.chart_calls()
    }

    pub fn last_market_ids(&self) -> Vec<CoinId> {
        self.script.lock().unwrap().last_market_ids.clone()
    }

    /// Sleep for the scripted delay, then report the scripted failure.
    async fn pause(&self) -> Result<(), UpstreamError> {
        let (delay, failure) = {
            let script = self.script.lock().unwrap();
            (script.delay, script.failure.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        failure.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    // Ignores `per_page` so callers' own truncation is exercised.
    async fn top_markets(&self, _per_page: usize) -> Result<Vec<MarketSnapshot>, UpstreamError> {
        self.top_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        Ok(self.script.lock().unwrap().top.clone())
    }

    async fn markets_for_ids(&self, ids: &[CoinId]) -> Result<Vec<MarketSnapshot>, UpstreamError> {
        self.markets_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        let mut script = self.script.lock().unwrap();
        script.last_market_ids = ids.to_vec();
        Ok(script
            .markets
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, UpstreamError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        let script = self.script.lock().unwrap();
        Ok(script.searches.get(query).cloned().unwrap_or_default())
    }

    async fn coin(&self, _id: &str) -> Result<Map<String, Value>, UpstreamError> {
        self.coin_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        Ok(self.script.lock().unwrap().coin.clone())
    }

    async fn market_chart(&self, _id: &str, _days: u32) -> Result<Vec<PricePoint>, UpstreamError> {
        self.chart_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        Ok(self.script.lock().unwrap().chart.clone())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
