//! Prometheus metrics registry

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,
    pub scoring_passes_total: IntCounter,
    pub scoring_pass_failures_total: IntCounter,
    pub items_scored_total: IntCounter,
    pub scoring_pass_duration_seconds: Histogram,
    pub snapshots_ingested_total: IntCounter,
    pub database_connected: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total HTTP requests handled")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests currently in flight")?;
        let scoring_passes_total =
            IntCounter::new("scoring_passes_total", "Completed population scoring passes")?;
        let scoring_pass_failures_total = IntCounter::new(
            "scoring_pass_failures_total",
            "Scoring passes aborted before scoring",
        )?;
        let items_scored_total =
            IntCounter::new("items_scored_total", "Items scored across all passes")?;
        let scoring_pass_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "scoring_pass_duration_seconds",
            "Wall time of a population scoring pass",
        ))?;
        let snapshots_ingested_total =
            IntCounter::new("snapshots_ingested_total", "Snapshots accepted for ingestion")?;
        let database_connected =
            Gauge::new("database_connected", "1 when the item store is reachable")?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(scoring_passes_total.clone()))?;
        registry.register(Box::new(scoring_pass_failures_total.clone()))?;
        registry.register(Box::new(items_scored_total.clone()))?;
        registry.register(Box::new(scoring_pass_duration_seconds.clone()))?;
        registry.register(Box::new(snapshots_ingested_total.clone()))?;
        registry.register(Box::new(database_connected.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            scoring_passes_total,
            scoring_pass_failures_total,
            items_scored_total,
            scoring_pass_duration_seconds,
            snapshots_ingested_total,
            database_connected,
        })
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
