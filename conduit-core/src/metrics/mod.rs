//! Observability boundary
//!
//! Stages emit counters and latencies through [`MetricsSink`], a
//! fire-and-forget interface: implementations must never block the caller
//! and have no way to fail it. Aggregation and export belong to whatever
//! sits behind the sink.
//!
//! - [`NoopMetrics`]: discards everything (default)
//! - [`PrometheusMetrics`]: `prometheus` registry with text rendering
//! - [`StageCounters`]: lock-free counters owned by each stage runner

pub mod counters;
pub mod registry;

pub use counters::{StageCounters, StageCountersSnapshot};
pub use registry::PrometheusMetrics;

use std::sync::Arc;

/// Consumed observability collaborator
pub trait MetricsSink: Send + Sync {
    /// Add `value` to the counter `counter`
    fn record(&self, counter: &str, value: u64);

    /// Record one latency observation for `stage` (a stage name, or one of
    /// [`names::INGEST`] / [`names::END_TO_END`])
    fn record_latency(&self, stage: &str, nanos: u64);
}

impl<M: MetricsSink + ?Sized> MetricsSink for Arc<M> {
    fn record(&self, counter: &str, value: u64) {
        (**self).record(counter, value)
    }

    fn record_latency(&self, stage: &str, nanos: u64) {
        (**self).record_latency(stage, nanos)
    }
}

/// Sink that drops every observation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    #[inline(always)]
    fn record(&self, _counter: &str, _value: u64) {}

    #[inline(always)]
    fn record_latency(&self, _stage: &str, _nanos: u64) {}
}

/// Counter and latency names emitted by the pipeline
pub mod names {
    /// Latency from producer claim to commit
    pub const INGEST: &str = "ingest";
    /// Latency from producer commit to the Audit stage
    pub const END_TO_END: &str = "end_to_end";

    pub const EVENTS_PUBLISHED: &str = "events_published";
    pub const BACKPRESSURE_REJECTS: &str = "backpressure_rejects";
    pub const SESSION_PAUSED_REJECTS: &str = "session_paused_rejects";
    pub const DECODE_ERRORS: &str = "decode_errors";
    pub const VALIDATION_REJECTS: &str = "validation_rejects";
    pub const RISK_REJECTS: &str = "risk_rejects";
    pub const SEND_FAILURES: &str = "send_failures";
    pub const SENDS: &str = "orders_sent";
    pub const DUPLICATE_SENDS: &str = "duplicate_sends";
    pub const RETRIES_EXHAUSTED: &str = "retries_exhausted";
    pub const STAGE_FAULTS: &str = "stage_faults";
    pub const ORDER_STATE_VIOLATIONS: &str = "order_state_violations";
    pub const AUDIT_RECORDS: &str = "audit_records";
    pub const AUDIT_FAILURES: &str = "audit_failures";
    pub const SESSION_DROPS: &str = "session_drops";
    pub const TICKS_FORWARDED: &str = "ticks_forwarded";
}
