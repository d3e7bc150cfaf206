//! Audit: records the terminal outcome of every event
//!
//! Runs last and sees rejected slots too. A sink failure is logged and
//! counted; the stage always forwards so the ring keeps moving.

use super::{names as stage_names, Stage, StageOutcome};
use crate::audit::{AuditRecord, AuditSink};
use crate::core::{clock, EventSlot};
use crate::metrics::{names, MetricsSink};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Audit {
    sink: Arc<dyn AuditSink>,
    metrics: Arc<dyn MetricsSink>,
    recorded: u64,
    failed: u64,
}

impl Audit {
    pub fn new(sink: Arc<dyn AuditSink>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            metrics,
            recorded: 0,
            failed: 0,
        }
    }
}

impl Stage for Audit {
    fn name(&self) -> &'static str {
        stage_names::AUDIT
    }

    fn observes_rejected(&self) -> bool {
        true
    }

    fn process_one(&mut self, slot: &mut EventSlot) -> StageOutcome {
        let latency_ns = clock::monotonic_ns().saturating_sub(slot.ingest_ns());
        let Some(record) = AuditRecord::from_slot(slot, clock::wall_clock_ns(), latency_ns) else {
            return StageOutcome::Forward;
        };
        self.metrics.record_latency(names::END_TO_END, latency_ns);

        let sequence = record.sequence;
        match self.sink.record(record) {
            Ok(()) => {
                self.recorded += 1;
                self.metrics.record(names::AUDIT_RECORDS, 1);
            }
            Err(e) => {
                self.failed += 1;
                warn!(?sequence, "Failed to record audit entry: {}", e);
                self.metrics.record(names::AUDIT_FAILURES, 1);
            }
        }
        StageOutcome::Forward
    }

    fn on_shutdown(&mut self) {
        info!(
            recorded = self.recorded,
            failed = self.failed,
            "Audit stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditError, AuditOutcome, MemoryAuditSink};
    use crate::core::{
        CorrelationId, EventPayload, MarketDataTick, RejectCode, Symbol, TradingEvent,
        ValidationFailure,
    };
    use crate::metrics::PrometheusMetrics;

    struct Broken;

    impl AuditSink for Broken {
        fn record(&self, _record: AuditRecord) -> Result<(), AuditError> {
            Err(AuditError::Full)
        }
    }

    fn filled_slot() -> EventSlot {
        let mut slot = EventSlot::default();
        slot.fill(
            3,
            TradingEvent::new(
                CorrelationId(9),
                0,
                EventPayload::MarketDataTick(MarketDataTick {
                    symbol: Symbol::new("X").unwrap(),
                    bid_price: 1,
                    bid_quantity: 1,
                    ask_price: 2,
                    ask_quantity: 1,
                }),
            ),
            0,
            clock::monotonic_ns(),
        );
        slot
    }

    #[test]
    fn test_records_rejected_slot() {
        let sink = Arc::new(MemoryAuditSink::new());
        let metrics = Arc::new(PrometheusMetrics::new().unwrap());
        let mut audit = Audit::new(sink.clone(), metrics.clone());

        let mut slot = filled_slot();
        slot.reject("validation", ValidationFailure::EmptySymbol.into());
        assert_eq!(audit.process_one(&mut slot), StageOutcome::Forward);

        let record = sink.find_by_sequence(3).unwrap();
        assert_eq!(record.outcome, AuditOutcome::Rejected);
        assert_eq!(record.reason_code, Some(RejectCode::ValidationReject));
        assert_eq!(record.rejected_by.as_deref(), Some("validation"));
        assert_eq!(metrics.counter_value(names::AUDIT_RECORDS), 1);
        assert_eq!(metrics.latency_count(names::END_TO_END), 1);
    }

    #[test]
    fn test_sink_failure_is_swallowed() {
        let metrics = Arc::new(PrometheusMetrics::new().unwrap());
        let mut audit = Audit::new(Arc::new(Broken), metrics.clone());

        assert_eq!(audit.process_one(&mut filled_slot()), StageOutcome::Forward);
        assert_eq!(metrics.counter_value(names::AUDIT_FAILURES), 1);
        assert_eq!(audit.failed, 1);
    }

    #[test]
    fn test_observes_rejected() {
        let audit = Audit::new(
            Arc::new(MemoryAuditSink::new()),
            Arc::new(crate::metrics::NoopMetrics),
        );
        assert!(audit.observes_rejected());
    }
}
