//! End-to-end Tests - HTTP and WebSocket Surface
//!
//! Serves the full axum router on an ephemeral local port over a mocked
//! provider and drives it with reqwest and tokio-tungstenite.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use mockall::mock;
use serde_json::{json, Map, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use coinpulse::adapters::metrics::MetricsRegistry;
use coinpulse::app::Relay;
use coinpulse::config::AppConfig;
use coinpulse::domain::coin::{CoinId, MarketSnapshot, PricePoint, SearchHit};
use coinpulse::ports::market_data::{MarketDataProvider, UpstreamError};
use coinpulse::usecases::CycleOutcome;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

mock! {
    pub Provider {}

    #[async_trait::async_trait]
    impl MarketDataProvider for Provider {
        async fn top_markets(&self, per_page: usize) -> Result<Vec<MarketSnapshot>, UpstreamError>;
        async fn markets_for_ids(&self, ids: &[CoinId]) -> Result<Vec<MarketSnapshot>, UpstreamError>;
        async fn search(&self, query: &str) -> Result<Vec<SearchHit>, UpstreamError>;
        async fn coin(&self, id: &str) -> Result<Map<String, Value>, UpstreamError>;
        async fn market_chart(&self, id: &str, days: u32) -> Result<Vec<PricePoint>, UpstreamError>;
        fn provider_name(&self) -> &'static str;
    }
}

fn coin(id: &str) -> MarketSnapshot {
    MarketSnapshot::new(id, id.to_uppercase(), id)
}

fn hit(id: &str) -> SearchHit {
    SearchHit {
        id: id.to_string(),
        name: id.to_uppercase(),
        symbol: id.to_string(),
        thumb: Some(format!("https://img/{id}.png")),
        large: None,
    }
}

/// Provider answering every call successfully.
fn healthy_provider() -> MockProvider {
    let mut mock = MockProvider::new();
    mock.expect_provider_name().return_const("mock");
    mock.expect_top_markets()
        .returning(|_| Ok(vec![coin("bitcoin"), coin("ethereum")]));
    mock.expect_search().returning(|q| match q {
        "bitcoin" => Ok(vec![hit("bitcoin"), hit("bitcoin-cash")]),
        "bit" => Ok(vec![hit("bitcoin")]),
        _ => Ok(Vec::new()),
    });
    mock.expect_markets_for_ids()
        .returning(|ids| Ok(ids.iter().rev().map(|id| coin(id)).collect()));
    mock.expect_coin().returning(|id| {
        let mut map = Map::new();
        map.insert("id".into(), Value::from(id));
        Ok(map)
    });
    mock.expect_market_chart()
        .returning(|_, _| Ok(vec![(1, 10.0), (2, 11.0)]));
    mock
}

/// Provider failing every call.
fn failing_provider() -> MockProvider {
    let mut mock = MockProvider::new();
    mock.expect_provider_name().return_const("mock");
    mock.expect_top_markets().returning(|_| Err(UpstreamError::Timeout));
    mock.expect_search().returning(|_| {
        Err(UpstreamError::RateLimited {
            message: "slow down".into(),
        })
    });
    mock.expect_markets_for_ids().returning(|_| Err(UpstreamError::Timeout));
    mock.expect_coin().returning(|_| {
        Err(UpstreamError::Http {
            status: 404,
            message: "coin not found".into(),
        })
    });
    mock.expect_market_chart().returning(|_, _| Ok(Vec::new()));
    mock
}

async fn serve(mock: MockProvider) -> (SocketAddr, Relay) {
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let relay = Relay::build(&AppConfig::default(), Arc::new(mock), metrics);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = relay.http_router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, relay)
}

async fn get_json(addr: SocketAddr, path: &str) -> (u16, Value) {
    let resp = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn next_event(ws: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

fn event_ids(event: &Value) -> Vec<String> {
    event["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

// ---- HTTP ----

#[tokio::test]
async fn test_liveness_payload() {
    let (addr, _relay) = serve(healthy_provider()).await;
    let (status, body) = get_json(addr, "/").await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "CryptoPulse API");
    assert_eq!(body["mode"], "development");
}

#[tokio::test]
async fn test_coin_list_and_search_alias() {
    let (addr, _relay) = serve(healthy_provider()).await;

    let (status, top) = get_json(addr, "/api/coins").await;
    assert_eq!(status, 200);
    assert_eq!(top[0]["id"], "bitcoin");

    let (status, found) = get_json(addr, "/api?search=Bitcoin").await;
    assert_eq!(status, 200);
    let ids: Vec<&str> = found
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["bitcoin", "bitcoin-cash"]);
}

#[tokio::test]
async fn test_coin_list_failure_is_500() {
    let (addr, _relay) = serve(failing_provider()).await;
    let (status, body) = get_json(addr, "/api/coins").await;

    assert_eq!(status, 500);
    assert_eq!(body, json!({"status": 500, "message": "Internal server error"}));
}

#[tokio::test]
async fn test_coin_detail_routes() {
    let (addr, _relay) = serve(healthy_provider()).await;

    let (status, body) = get_json(addr, "/api/coin/bitcoin").await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], "bitcoin");
    assert_eq!(body["priceHistory24h"], json!([[1, 10.0], [2, 11.0]]));

    let (status, body) = get_json(addr, "/api/coin/").await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "Coin ID is required"}));
}

#[tokio::test]
async fn test_coin_detail_failure_carries_provider_message() {
    let (addr, _relay) = serve(failing_provider()).await;
    let (status, body) = get_json(addr, "/api/coin/nope").await;

    assert_eq!(status, 500);
    assert_eq!(body["message"], "Internal server error");
    assert_eq!(body["error"], "coin not found");
}

#[tokio::test]
async fn test_suggestions_never_error() {
    let (addr, _relay) = serve(healthy_provider()).await;
    let (status, body) = get_json(addr, "/api/suggestions?q=b").await;
    assert_eq!((status, body), (200, json!([])));

    let (_, body) = get_json(addr, "/api/suggestions?q=bit").await;
    assert_eq!(body[0]["id"], "bitcoin");
    assert_eq!(body[0]["image"], "https://img/bitcoin.png");

    let (addr, _relay) = serve(failing_provider()).await;
    let (status, body) = get_json(addr, "/api/suggestions?q=bitcoin").await;
    assert_eq!((status, body), (200, json!([])));
}

#[tokio::test]
async fn test_cors_preflight_is_answered() {
    let (addr, _relay) = serve(healthy_provider()).await;
    let resp = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("http://{addr}/api/coins"))
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "GET")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_readiness_follows_first_broadcast() {
    let (addr, relay) = serve(healthy_provider()).await;
    let ready = |addr: SocketAddr| async move {
        reqwest::get(format!("http://{addr}/ready"))
            .await
            .unwrap()
            .status()
            .as_u16()
    };

    assert_eq!(ready(addr).await, 503);
    assert_eq!(relay.scheduler.tick().await, CycleOutcome::Fresh);
    assert_eq!(ready(addr).await, 200);

    let metrics = reqwest::get(format!("http://{addr}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("coinpulse_broadcast_cycles_total{outcome=\"fresh\"} 1"));
}

// ---- WebSocket ----

#[tokio::test]
async fn test_ws_subscribe_search_and_return() {
    let (addr, relay) = serve(healthy_provider()).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    // Initial snapshot is whatever the broadcast state holds (empty here).
    let initial = next_event(&mut ws).await;
    assert_eq!(initial, json!({"event": "coinsData", "data": []}));

    relay.scheduler.tick().await;
    let pushed = next_event(&mut ws).await;
    assert_eq!(pushed["event"], "coinsData");
    assert_eq!(event_ids(&pushed), vec!["bitcoin", "ethereum"]);

    ws.send(Message::Text(
        json!({"event": "searchCoins", "data": "bitcoin"}).to_string(),
    ))
    .await
    .unwrap();
    let searched = next_event(&mut ws).await;
    assert_eq!(event_ids(&searched), vec!["bitcoin", "bitcoin-cash"]);

    ws.send(Message::Text(r#"{"event":"requestCoins"}"#.to_string()))
        .await
        .unwrap();
    let back = next_event(&mut ws).await;
    assert_eq!(event_ids(&back), vec!["bitcoin", "ethereum"]);

    ws.close(None).await.unwrap();
    for _ in 0..50 {
        if relay.router.session_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(relay.router.session_count(), 0);
}

#[tokio::test]
async fn test_ws_cold_failure_broadcasts_error() {
    let (addr, relay) = serve(failing_provider()).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let _initial = next_event(&mut ws).await;

    assert_eq!(relay.scheduler.tick().await, CycleOutcome::Error);
    let event = next_event(&mut ws).await;
    assert_eq!(
        event,
        json!({"event": "coinsError", "data": "Could not update live data. Retrying soon."})
    );
}
