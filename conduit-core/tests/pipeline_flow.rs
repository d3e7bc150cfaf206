//! End-to-end flow through the standard four-stage pipeline

mod common;

use common::*;
use conduit_core::audit::{AuditOutcome, MemoryAuditSink};
use conduit_core::core::{CorrelationId, EventSlot, RejectCode};
use conduit_core::metrics::{names, PrometheusMetrics};
use conduit_core::ring::{BackpressurePolicy, ProducerMode};
use conduit_core::stage::{names as stage_names, Stage, StageOutcome};
use conduit_core::{Pipeline, PipelineBuilder};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const DRAIN: Duration = Duration::from_secs(10);

fn standard(
    capacity: usize,
) -> (
    Pipeline,
    Arc<RecordingGateway>,
    Arc<MemoryAuditSink>,
    Arc<PrometheusMetrics>,
) {
    let gateway = Arc::new(RecordingGateway::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let metrics = Arc::new(PrometheusMetrics::new().unwrap());
    let pipeline = Pipeline::standard(
        test_config(capacity, BackpressurePolicy::Block),
        gateway.clone(),
        audit.clone(),
        metrics.clone(),
    )
    .unwrap();
    (pipeline, gateway, audit, metrics)
}

/// Records every sequence it sees; optionally checks an upstream log
struct Recorder {
    name: &'static str,
    seen: Arc<Mutex<Vec<u64>>>,
    upstream: Option<Arc<Mutex<Vec<u64>>>>,
    overtakes: Arc<Mutex<u64>>,
}

impl Stage for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn process_one(&mut self, slot: &mut EventSlot) -> StageOutcome {
        let Some(sequence) = slot.sequence() else {
            return StageOutcome::Forward;
        };
        if let Some(upstream) = &self.upstream {
            if !upstream.lock().contains(&sequence) {
                *self.overtakes.lock() += 1;
            }
        }
        self.seen.lock().push(sequence);
        StageOutcome::Forward
    }
}

#[test]
fn test_stages_see_every_sequence_in_order() {
    let logs: Vec<Arc<Mutex<Vec<u64>>>> = (0..3).map(|_| Arc::default()).collect();
    let overtakes = Arc::new(Mutex::new(0));
    let names = ["first", "second", "third"];

    let mut builder = PipelineBuilder::new(test_config(16, BackpressurePolicy::Block));
    for (i, name) in names.into_iter().enumerate() {
        builder = builder.stage(Recorder {
            name,
            seen: logs[i].clone(),
            upstream: i.checked_sub(1).map(|prev| logs[prev].clone()),
            overtakes: overtakes.clone(),
        });
    }
    let mut pipeline = builder.build().unwrap();
    let mut producer = pipeline.producer(None).unwrap();
    pipeline.start().unwrap();

    const EVENTS: u64 = 1_000;
    for i in 1..=EVENTS {
        assert_eq!(producer.publish(tick(i)).unwrap(), i);
    }

    let report = pipeline.shutdown(DRAIN).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.cursor, EVENTS);

    let expected: Vec<u64> = (1..=EVENTS).collect();
    for log in &logs {
        assert_eq!(*log.lock(), expected);
    }
    assert_eq!(*overtakes.lock(), 0);
}

#[test]
fn test_multi_producer_sequences_are_dense() {
    let audit = Arc::new(MemoryAuditSink::new());
    let mut config = test_config(64, BackpressurePolicy::Block);
    config.ring.producer_mode = ProducerMode::Multi;
    let mut pipeline = PipelineBuilder::new(config)
        .stage(conduit_core::stage::Audit::new(
            audit.clone(),
            Arc::new(conduit_core::metrics::NoopMetrics),
        ))
        .build()
        .unwrap();
    pipeline.start().unwrap();

    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 2_500;
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let mut producer = pipeline.producer(None).unwrap();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    producer.publish(tick(p * PER_PRODUCER + i + 1)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let report = pipeline.shutdown(DRAIN).unwrap();
    assert!(report.drained);

    let records = audit.records();
    let total = PRODUCERS * PER_PRODUCER;
    let sequences: Vec<u64> = records.iter().filter_map(|r| r.sequence).collect();
    assert_eq!(sequences, (1..=total).collect::<Vec<_>>());

    // Each producer's own events keep their publish order
    for p in 0..PRODUCERS {
        let range = (p * PER_PRODUCER + 1)..=((p + 1) * PER_PRODUCER);
        let mine: Vec<u64> = records
            .iter()
            .map(|r| r.correlation_id.0)
            .filter(|id| range.contains(id))
            .collect();
        assert_eq!(mine, range.collect::<Vec<_>>());
    }
}

#[test]
fn test_validation_reject_reaches_audit_only() {
    let (mut pipeline, gateway, audit, metrics) = standard(16);
    let mut producer = pipeline.producer(None).unwrap();
    pipeline.start().unwrap();

    // Zero quantity fails validation
    producer.publish(new_order(1, 10, 0, 100)).unwrap();
    producer.publish(new_order(2, 11, 5, 100)).unwrap();

    let report = pipeline.shutdown(DRAIN).unwrap();
    assert!(report.is_clean());

    let rejected = audit.find_by_sequence(1).unwrap();
    assert_eq!(rejected.outcome, AuditOutcome::Rejected);
    assert_eq!(rejected.reason_code, Some(RejectCode::ValidationReject));
    assert_eq!(rejected.rejected_by.as_deref(), Some(stage_names::VALIDATION));

    let accepted = audit.find_by_sequence(2).unwrap();
    assert_eq!(accepted.outcome, AuditOutcome::Accepted);

    assert_eq!(gateway.sent(), vec![CorrelationId(2)]);
    assert_eq!(metrics.counter_value(names::VALIDATION_REJECTS), 1);
    assert_eq!(metrics.counter_value(names::AUDIT_RECORDS), 2);

    let risk = report
        .stages
        .iter()
        .find(|s| s.name == stage_names::RISK_CHECK)
        .unwrap();
    assert_eq!(risk.counters.skipped, 1);
    assert_eq!(risk.counters.processed, 1);
}

#[test]
fn test_oversized_fill_stops_at_validation() {
    let (mut pipeline, gateway, audit, _metrics) = standard(16);
    let mut producer = pipeline.producer(None).unwrap();
    pipeline.start().unwrap();

    producer.publish(new_order(1, 10, 5, 100)).unwrap();
    producer.publish(fill(2, 10, u64::MAX, 0)).unwrap();
    producer.publish(new_order(3, 11, 5, 100)).unwrap();

    let report = pipeline.shutdown(DRAIN).unwrap();
    assert!(report.is_clean());

    let rejected = audit.find_by_sequence(2).unwrap();
    assert_eq!(rejected.reason_code, Some(RejectCode::ValidationReject));
    assert_eq!(rejected.rejected_by.as_deref(), Some(stage_names::VALIDATION));
    assert_eq!(gateway.sent(), vec![CorrelationId(1), CorrelationId(3)]);
}

#[test]
fn test_risk_reject_and_order_lifecycle() {
    let (mut pipeline, gateway, audit, metrics) = standard(16);
    let mut producer = pipeline.producer(None).unwrap();
    pipeline.start().unwrap();

    producer.publish(new_order(1, 10, 5, 100)).unwrap();
    // Same order id again
    producer.publish(new_order(2, 10, 5, 100)).unwrap();
    producer.publish(fill(3, 10, 2, 3)).unwrap();
    producer.publish(cancel(4, 10)).unwrap();
    // Cancel for an order never seen
    producer.publish(cancel(5, 99)).unwrap();

    pipeline.shutdown(DRAIN).unwrap();

    assert_eq!(
        gateway.sent(),
        vec![CorrelationId(1), CorrelationId(4)]
    );
    let rejected: Vec<u64> = audit
        .rejected()
        .iter()
        .filter_map(|r| r.sequence)
        .collect();
    assert_eq!(rejected, vec![2, 5]);
    assert!(audit
        .rejected()
        .iter()
        .all(|r| r.reason_code == Some(RejectCode::RiskReject)));
    assert_eq!(metrics.counter_value(names::RISK_REJECTS), 2);
    assert_eq!(audit.len(), 5);
}

#[test]
fn test_send_failure_escalates_after_retries() {
    let (mut pipeline, gateway, audit, metrics) = standard(16);
    let mut producer = pipeline.producer(None).unwrap();
    gateway.set_failing(true);
    pipeline.start().unwrap();

    producer.publish(new_order(1, 10, 5, 100)).unwrap();
    producer.publish(tick(2)).unwrap();

    pipeline.shutdown(DRAIN).unwrap();

    let record = audit.find_by_sequence(1).unwrap();
    assert_eq!(record.reason_code, Some(RejectCode::SendFailure));
    assert_eq!(record.rejected_by.as_deref(), Some(stage_names::ROUTER));
    assert_eq!(
        audit.find_by_sequence(2).unwrap().outcome,
        AuditOutcome::Accepted
    );
    assert!(gateway.sent().is_empty());
    // One initial attempt plus two retries
    assert_eq!(metrics.counter_value(names::SEND_FAILURES), 3);
    assert_eq!(metrics.counter_value(names::RETRIES_EXHAUSTED), 1);
}

#[test]
fn test_sustained_throughput_small_ring() {
    let (mut pipeline, gateway, audit, _metrics) = standard(256);
    let mut producer = pipeline.producer(None).unwrap();
    pipeline.start().unwrap();

    const EVENTS: u64 = 50_000;
    for i in 1..=EVENTS {
        let event = if i % 2 == 0 {
            tick(i)
        } else {
            new_order(i, i as u128, 1, 100)
        };
        producer.publish(event).unwrap();
    }

    let report = pipeline.shutdown(Duration::from_secs(30)).unwrap();
    assert!(report.drained);
    assert_eq!(report.unprocessed, 0);
    assert_eq!(audit.len(), EVENTS as usize);
    // The open-order limit caps how many buys RiskCheck lets through
    let sent = gateway.sent().len() as u64;
    assert_eq!(sent + audit.rejected().len() as u64, EVENTS / 2);
}

#[test]
fn test_cancel_sees_preceding_new_order() {
    let (mut pipeline, gateway, audit, _metrics) = standard(8);
    let mut producer = pipeline.producer(None).unwrap();
    pipeline.start().unwrap();

    producer.publish(new_order(1, 500, 100, 100)).unwrap();
    producer.publish(cancel(2, 500)).unwrap();
    pipeline.shutdown(DRAIN).unwrap();

    // An unknown-order reject here would mean the cancel overtook the order
    assert!(audit.rejected().is_empty());
    assert_eq!(gateway.sent(), vec![CorrelationId(1), CorrelationId(2)]);
}
