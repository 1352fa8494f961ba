//! Prometheus metrics registry for statsgate
//!
//! The client keeps its own counters ([`RequestMeter`], cache stats, pipeline
//! occupancy). This registry mirrors them into gauges at scrape time, so the
//! exposition always matches what the client itself reports.

use prometheus::{Encoder, Gauge, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use statsgate_client::{
    cache::CacheStats, meter::MeterSnapshot, pipeline::QuotaGovernor, StatsClient,
};

/// Central metrics registry holding all Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Attempts sent upstream, retries included
    pub api_requests: IntGauge,
    /// Attempts answered with 429
    pub api_throttled_requests: IntGauge,
    /// Cumulative attempt latency in milliseconds
    pub api_request_elapsed_ms: IntGauge,
    /// Attempts per endpoint label
    pub api_endpoint_requests: IntGaugeVec,
    pub cache_entries: IntGauge,
    /// Cache lookups by result (hit, miss)
    pub cache_lookups: IntGaugeVec,
    pub pipeline_pending: IntGauge,
    pub pipeline_in_flight: IntGauge,
    pub pipeline_available_tokens: Gauge,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("statsgate".to_string()), None)?;

        let api_requests = IntGauge::with_opts(Opts::new(
            "api_requests",
            "Attempts sent upstream, retries included",
        ))?;
        registry.register(Box::new(api_requests.clone()))?;

        let api_throttled_requests = IntGauge::with_opts(Opts::new(
            "api_throttled_requests",
            "Attempts answered with 429 Too Many Requests",
        ))?;
        registry.register(Box::new(api_throttled_requests.clone()))?;

        let api_request_elapsed_ms = IntGauge::with_opts(Opts::new(
            "api_request_elapsed_ms",
            "Cumulative attempt latency in milliseconds",
        ))?;
        registry.register(Box::new(api_request_elapsed_ms.clone()))?;

        let api_endpoint_requests = IntGaugeVec::new(
            Opts::new("api_endpoint_requests", "Attempts per endpoint"),
            &["endpoint"],
        )?;
        registry.register(Box::new(api_endpoint_requests.clone()))?;

        let cache_entries =
            IntGauge::with_opts(Opts::new("cache_entries", "Entries in the response cache"))?;
        registry.register(Box::new(cache_entries.clone()))?;

        let cache_lookups = IntGaugeVec::new(
            Opts::new("cache_lookups", "Response cache lookups by result"),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups.clone()))?;

        let pipeline_pending = IntGauge::with_opts(Opts::new(
            "pipeline_pending",
            "Requests queued or in flight",
        ))?;
        registry.register(Box::new(pipeline_pending.clone()))?;

        let pipeline_in_flight = IntGauge::with_opts(Opts::new(
            "pipeline_in_flight",
            "Requests holding an execution slot",
        ))?;
        registry.register(Box::new(pipeline_in_flight.clone()))?;

        let pipeline_available_tokens = Gauge::with_opts(Opts::new(
            "pipeline_available_tokens",
            "Tokens currently available in the rate limiter",
        ))?;
        registry.register(Box::new(pipeline_available_tokens.clone()))?;

        Ok(Self {
            registry,
            api_requests,
            api_throttled_requests,
            api_request_elapsed_ms,
            api_endpoint_requests,
            cache_entries,
            cache_lookups,
            pipeline_pending,
            pipeline_in_flight,
            pipeline_available_tokens,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Mirror a meter snapshot.
    pub fn record_snapshot(&self, snapshot: &MeterSnapshot) {
        self.api_requests.set(to_i64(snapshot.requests));
        self.api_throttled_requests.set(to_i64(snapshot.status_429));
        self.api_request_elapsed_ms.set(to_i64(snapshot.elapsed_ms));
        for (endpoint, count) in &snapshot.per_endpoint {
            self.api_endpoint_requests
                .with_label_values(&[endpoint.as_str()])
                .set(to_i64(*count));
        }
    }

    /// Mirror cache statistics.
    pub fn record_cache(&self, stats: &CacheStats) {
        self.cache_entries.set(stats.entries as i64);
        self.cache_lookups
            .with_label_values(&["hit"])
            .set(to_i64(stats.hits));
        self.cache_lookups
            .with_label_values(&["miss"])
            .set(to_i64(stats.misses));
    }

    /// Mirror pipeline occupancy.
    pub fn record_pipeline(&self, governor: &QuotaGovernor) {
        self.pipeline_pending.set(governor.pending() as i64);
        self.pipeline_in_flight.set(governor.in_flight() as i64);
        self.pipeline_available_tokens
            .set(governor.available_tokens());
    }

    /// Mirror everything a client exposes.
    pub fn record_client(&self, client: &StatsClient) {
        self.record_snapshot(&client.meter().snapshot());
        self.record_cache(&client.cache_stats());
        self.record_pipeline(client.governor());
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
