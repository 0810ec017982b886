//! CoinPulse Relay - Entry Point
//!
//! Initializes configuration, logging, the upstream client and the relay
//! components, then serves HTTP and WebSocket traffic until SIGINT/SIGTERM.
//!
//! Wiring sequence:
//! 1. Load config (first CLI arg, else CONFIG_PATH, else config.toml;
//!    a missing file means defaults) + env overrides + validation
//! 2. Init tracing (JSON in production, human-readable in development)
//! 3. Create CoinGeckoClient (timeout + concurrency cap + request budget)
//! 4. Wire cache, broadcast state, session router, scheduler
//! 5. Spawn the broadcast scheduler (first tick immediately)
//! 6. Bind the listener (fail fast) and serve
//! 7. On signal: stop the scheduler, close every session, drain

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use coinpulse::adapters::coingecko::{CoinGeckoClient, CoinGeckoClientConfig};
use coinpulse::adapters::metrics::MetricsRegistry;
use coinpulse::app::Relay;
use coinpulse::config::loader::ConfigSource;
use coinpulse::config::{self, RunMode, ServerConfig};
use coinpulse::usecases::SessionRouter;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CONFIG_PATH").ok())
        .unwrap_or_else(|| "config.toml".to_string());
    let (config, source) = config::loader::load_or_default(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured logging ────────────────────
    init_tracing(&config.server);

    match &source {
        ConfigSource::File(path) => info!(path = %path, "Configuration loaded from file"),
        ConfigSource::Defaults(path) => {
            warn!(path = %path, "Config file not found, using defaults and environment");
        }
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.server.mode,
        upstream = %config.upstream.base_url,
        api_key = config.upstream.api_key.is_some(),
        ttl_ms = config.cache.ttl_ms,
        refresh_ms = config.cache.refresh_interval_ms,
        "Starting CoinPulse relay"
    );

    // ── 3. Shutdown signal channel ──────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 4. Upstream client + component graph ────────────────
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let client = CoinGeckoClient::new(
        CoinGeckoClientConfig::from(&config.upstream),
        Arc::clone(&metrics),
    )
    .context("Failed to create CoinGecko client")?;
    let relay = Relay::build(&config, Arc::new(client), metrics);

    // ── 5. Spawn broadcast scheduler ────────────────────────
    let scheduler_handle = tokio::spawn(
        Arc::clone(&relay.scheduler).run(shutdown_tx.subscribe()),
    );

    // ── 6. Bind and serve ───────────────────────────────────
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "HTTP and WebSocket server listening");

    let router = Arc::clone(&relay.router);
    axum::serve(listener, relay.http_router())
        .with_graceful_shutdown(shutdown(shutdown_tx, router))
        .await
        .context("HTTP server failed")?;

    // ── 7. Wait for the scheduler to exit ───────────────────
    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "Broadcast scheduler task panicked");
    }

    info!("Shutdown complete");
    Ok(())
}

/// JSON lines in production, human-readable text in development.
/// `RUST_LOG` wins over the configured level.
fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match server.mode {
        RunMode::Production => builder.json().init(),
        RunMode::Development => builder.init(),
    }
}

/// Resolves once SIGINT or SIGTERM arrives, after stopping the scheduler
/// and closing every session so open sockets can drain.
async fn shutdown(shutdown_tx: broadcast::Sender<()>, router: Arc<SessionRouter>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, initiating graceful shutdown"),
        _ = terminate => info!("SIGTERM received, initiating graceful shutdown"),
    }

    let _ = shutdown_tx.send(());
    router.shutdown();
}
