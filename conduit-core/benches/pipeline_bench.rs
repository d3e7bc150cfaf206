//! Pipeline Benchmarks
//!
//! End-to-end cost of moving events through the standard four stages, plus
//! the FIX decode step that sits in front of the producer.
//!
//! ## Operations Tested
//!
//! 1. **Throughput** - batches of events published then drained
//! 2. **FIX decode** - parse + map for each inbound message type

use conduit_core::audit::{AuditError, AuditRecord, AuditSink};
use conduit_core::config::PipelineConfig;
use conduit_core::core::{
    fixed_point, CorrelationId, EventPayload, MarketDataTick, Symbol, TradingEvent,
};
use conduit_core::gateway::fix::FixMessage;
use conduit_core::gateway::{Ack, DecodeError, FixCodec, SendFailure, SessionGateway};
use conduit_core::metrics::NoopMetrics;
use conduit_core::ring::{BackpressurePolicy, WaitStrategyKind};
use conduit_core::Pipeline;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

struct NullGateway;

impl SessionGateway for NullGateway {
    fn on_inbound_message(&self, _raw: &[u8]) -> Result<Option<TradingEvent>, DecodeError> {
        Ok(None)
    }

    fn send_outbound(&self, _event: &TradingEvent) -> Result<Ack, SendFailure> {
        Ok(Ack::Sent)
    }
}

struct NullAudit;

impl AuditSink for NullAudit {
    fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        black_box(record);
        Ok(())
    }
}

fn tick(i: u64) -> TradingEvent {
    TradingEvent::new(
        CorrelationId(i),
        0,
        EventPayload::MarketDataTick(MarketDataTick {
            symbol: Symbol::new("BTC-USD").unwrap(),
            bid_price: fixed_point::from_units(49_999),
            bid_quantity: 3,
            ask_price: fixed_point::from_units(50_001),
            ask_quantity: 2,
        }),
    )
}

fn throughput_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/throughput");
    group.sample_size(10).measurement_time(Duration::from_secs(10));

    for batch in [1_000u64, 10_000] {
        group.throughput(Throughput::Elements(batch));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter(|| {
                let mut config = PipelineConfig::default();
                config.ring.capacity = 4096;
                config.ring.backpressure = BackpressurePolicy::Block;
                config.ring.wait_strategy = WaitStrategyKind::Yielding;

                let mut pipeline = Pipeline::standard(
                    config,
                    Arc::new(NullGateway),
                    Arc::new(NullAudit),
                    Arc::new(NoopMetrics),
                )
                .unwrap();
                let mut producer = pipeline.producer(None).unwrap();
                pipeline.start().unwrap();

                for i in 1..=batch {
                    producer.publish(tick(i)).unwrap();
                }
                black_box(pipeline.shutdown(Duration::from_secs(30)).unwrap())
            });
        });
    }

    group.finish();
}

fn fix_decode_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/fix_decode");
    let codec = FixCodec::new("CONDUIT", "EXCHANGE");

    let frames: [(&str, &[u8]); 3] = [
        (
            "new_order",
            b"8=FIX.4.4\x0135=D\x0134=12\x0111=42\x0155=BTC-USD\x0154=1\x0138=10\x0140=2\x0144=50000.5\x01",
        ),
        (
            "execution_report",
            b"8=FIX.4.4\x0135=8\x0134=13\x0111=42\x0155=BTC-USD\x0154=1\x01150=F\x0132=4\x0131=50000\x01151=6\x01",
        ),
        (
            "market_data",
            b"8=FIX.4.4\x0135=W\x0134=14\x0155=BTC-USD\x01132=49999\x01134=3\x01133=50001\x01135=2\x01",
        ),
    ];

    for (name, raw) in frames {
        group.bench_function(name, |b| {
            b.iter(|| {
                let msg = FixMessage::parse(black_box(raw)).unwrap();
                black_box(codec.decode_event(&msg).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, throughput_bench, fix_decode_bench);
criterion_main!(benches);
