//! Prometheus adapter for [`MetricsSink`]
//!
//! Counters land in one `IntCounterVec` labelled by counter name, latencies
//! in one `HistogramVec` labelled by stage. Scraping/export is left to the
//! embedding process; [`PrometheusMetrics::render`] produces the text
//! exposition format for it.

use super::MetricsSink;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use tracing::info;

/// Nanosecond latency buckets, from sub-microsecond stage work up to
/// millisecond-scale send stalls
const LATENCY_BUCKETS_NS: &[f64] = &[
    100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 25_000.0, 50_000.0, 100_000.0,
    250_000.0, 1_000_000.0, 10_000_000.0,
];

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Arc<Registry>,
    counters: IntCounterVec,
    latency: HistogramVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Register the metric families on an existing registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let counters = IntCounterVec::new(
            Opts::new("pipeline_events_total", "Pipeline event counters by name")
                .namespace("conduit"),
            &["counter"],
        )?;
        registry.register(Box::new(counters.clone()))?;

        let latency = HistogramVec::new(
            HistogramOpts::new(
                "pipeline_latency_ns",
                "Per-stage, ingest and end-to-end latency in nanoseconds",
            )
            .namespace("conduit")
            .buckets(LATENCY_BUCKETS_NS.to_vec()),
            &["stage"],
        )?;
        registry.register(Box::new(latency.clone()))?;

        info!("Prometheus metrics registry initialized");

        Ok(Self {
            registry,
            counters,
            latency,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current value of a counter (0 if never recorded)
    pub fn counter_value(&self, name: &str) -> u64 {
        self.counters.with_label_values(&[name]).get()
    }

    /// Number of latency observations recorded under `stage`
    pub fn latency_count(&self, stage: &str) -> u64 {
        self.latency.with_label_values(&[stage]).get_sample_count()
    }

    /// Text exposition format of every registered family
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricsSink for PrometheusMetrics {
    fn record(&self, counter: &str, value: u64) {
        self.counters.with_label_values(&[counter]).inc_by(value);
    }

    fn record_latency(&self, stage: &str, nanos: u64) {
        self.latency.with_label_values(&[stage]).observe(nanos as f64);
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}
