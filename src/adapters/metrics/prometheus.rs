//! Prometheus Metrics Registry - Relay Observability
//!
//! Registers the relay's counters, gauges and histograms and renders them
//! in the Prometheus text format for the `/metrics` route. Covers upstream
//! latency and outcomes, cache hit ratio, broadcast cycles and connected
//! sessions.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Centralized Prometheus metrics for the relay.
///
/// All metrics follow the naming convention `coinpulse_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Upstream requests by endpoint and outcome (`ok` or an error kind).
    pub upstream_requests: IntCounterVec,
    /// Upstream request latency histogram (milliseconds).
    pub upstream_latency_ms: HistogramVec,
    /// Cache lookups by result (`hit`, `miss`, `stale`).
    pub cache_lookups: IntCounterVec,
    /// Broadcast cycles by outcome (`fresh`, `stale`, `error`, `skipped`).
    pub broadcast_cycles: IntCounterVec,
    /// Currently connected real-time sessions.
    pub sessions_connected: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let upstream_requests = IntCounterVec::new(
            Opts::new(
                "coinpulse_upstream_requests_total",
                "Upstream provider requests by endpoint and outcome",
            ),
            &["endpoint", "outcome"],
        )?;

        let upstream_latency_ms = HistogramVec::new(
            HistogramOpts::new(
                "coinpulse_upstream_latency_ms",
                "Upstream request latency in milliseconds",
            )
            .buckets(vec![
                50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 12000.0,
            ]),
            &["endpoint"],
        )?;

        let cache_lookups = IntCounterVec::new(
            Opts::new("coinpulse_cache_lookups_total", "Market cache lookups by result"),
            &["result"],
        )?;

        let broadcast_cycles = IntCounterVec::new(
            Opts::new(
                "coinpulse_broadcast_cycles_total",
                "Top-coins broadcast cycles by outcome",
            ),
            &["outcome"],
        )?;

        let sessions_connected = IntGauge::new(
            "coinpulse_sessions_connected",
            "Currently connected real-time sessions",
        )?;

        // Register all metrics
        registry.register(Box::new(upstream_requests.clone()))?;
        registry.register(Box::new(upstream_latency_ms.clone()))?;
        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(broadcast_cycles.clone()))?;
        registry.register(Box::new(sessions_connected.clone()))?;

        Ok(Self {
            registry,
            upstream_requests,
            upstream_latency_ms,
            cache_lookups,
            broadcast_cycles,
            sessions_connected,
        })
    }

    /// Record one finished upstream request.
    pub fn record_upstream(&self, endpoint: &str, outcome: &str, elapsed_ms: f64) {
        self.upstream_requests
            .with_label_values(&[endpoint, outcome])
            .inc();
        self.upstream_latency_ms
            .with_label_values(&[endpoint])
            .observe(elapsed_ms);
    }

    /// Record one cache lookup result.
    pub fn record_cache(&self, result: &str) {
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    /// Record one broadcast cycle outcome.
    pub fn record_broadcast(&self, outcome: &str) {
        self.broadcast_cycles.with_label_values(&[outcome]).inc();
    }

    /// Render every registered metric in the text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.record_upstream("search", "ok", 42.0);
        metrics.record_cache("hit");
        metrics.record_broadcast("skipped");
        metrics.sessions_connected.set(3);

        let text = metrics.render().unwrap();
        assert!(text.contains("coinpulse_upstream_requests_total{endpoint=\"search\",outcome=\"ok\"} 1"));
        assert!(text.contains("coinpulse_cache_lookups_total{result=\"hit\"} 1"));
        assert!(text.contains("coinpulse_broadcast_cycles_total{outcome=\"skipped\"} 1"));
        assert!(text.contains("coinpulse_sessions_connected 3"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = MetricsRegistry::new().unwrap();
        let b = MetricsRegistry::new().unwrap();
        a.record_cache("miss");
        assert_eq!(b.cache_lookups.with_label_values(&["miss"]).get(), 0);
    }
}
