//! Shared fixtures for integration tests

#![allow(dead_code)]

use conduit_core::config::PipelineConfig;
use conduit_core::core::{
    fixed_point, CancelOrder, CorrelationId, EventPayload, ExecType, ExecutionReport,
    MarketDataTick, NewOrder, OrderId, OrderType, Side, Symbol, TradingEvent,
};
use conduit_core::gateway::{Ack, DecodeError, SendFailure, SessionGateway};
use conduit_core::ring::{BackpressurePolicy, WaitStrategyKind};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub const SYMBOL: &str = "BTC-USD";

/// Small ring, fast retries
pub fn test_config(capacity: usize, policy: BackpressurePolicy) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.ring.capacity = capacity;
    config.ring.backpressure = policy;
    config.ring.wait_strategy = WaitStrategyKind::Blocking;
    config.stages.max_park_retries = 2;
    config.stages.park_initial_delay_us = 1;
    config.stages.park_max_delay_us = 10;
    config
}

pub fn symbol() -> Symbol {
    Symbol::new(SYMBOL).unwrap()
}

pub fn new_order(correlation: u64, order_id: u128, quantity: u64, price_units: u64) -> TradingEvent {
    TradingEvent::new(
        CorrelationId(correlation),
        0,
        EventPayload::NewOrder(NewOrder {
            order_id: OrderId(order_id),
            symbol: symbol(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            quantity,
            price: fixed_point::from_units(price_units),
        }),
    )
}

pub fn cancel(correlation: u64, order_id: u128) -> TradingEvent {
    TradingEvent::new(
        CorrelationId(correlation),
        0,
        EventPayload::CancelOrder(CancelOrder {
            order_id: OrderId(order_id),
            symbol: symbol(),
        }),
    )
}

pub fn fill(correlation: u64, order_id: u128, quantity: u64, leaves: u64) -> TradingEvent {
    TradingEvent::new(
        CorrelationId(correlation),
        0,
        EventPayload::ExecutionReport(ExecutionReport {
            order_id: OrderId(order_id),
            symbol: symbol(),
            side: Side::Buy,
            exec_type: if leaves == 0 {
                ExecType::Fill
            } else {
                ExecType::PartialFill
            },
            last_quantity: quantity,
            last_price: fixed_point::from_units(100),
            leaves_quantity: leaves,
        }),
    )
}

pub fn tick(correlation: u64) -> TradingEvent {
    TradingEvent::new(
        CorrelationId(correlation),
        0,
        EventPayload::MarketDataTick(MarketDataTick {
            symbol: symbol(),
            bid_price: fixed_point::from_units(99),
            bid_quantity: 5,
            ask_price: fixed_point::from_units(101),
            ask_quantity: 5,
        }),
    )
}

/// Gateway that records every outbound correlation id
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<CorrelationId>>,
    failing: AtomicBool,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<CorrelationId> {
        self.sent.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

impl SessionGateway for RecordingGateway {
    fn on_inbound_message(&self, _raw: &[u8]) -> Result<Option<TradingEvent>, DecodeError> {
        Ok(None)
    }

    fn send_outbound(&self, event: &TradingEvent) -> Result<Ack, SendFailure> {
        if self.failing.load(Ordering::Acquire) {
            return Err(SendFailure::Busy);
        }
        self.sent.lock().push(event.correlation_id);
        Ok(Ack::Sent)
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
