//! Trading events and the reusable ring slot that carries them
//!
//! ```text
//! EventSlot (pre-allocated, overwritten in place)
//! ┌──────────────────────────────────────────────┐
//! │ event: Option<TradingEvent>                  │
//! │   ├─ sequence / timestamp_ns / correlation   │
//! │   └─ payload: NewOrder | CancelOrder |       │
//! │               ExecutionReport | MarketData   │
//! │ ingest_ns      (monotonic, set at claim)     │
//! │ producer       (session id of the publisher) │
//! │ disposition    Pending | Rejected{stage, ..} │
//! └──────────────────────────────────────────────┘
//! ```

use super::reject::RejectReason;
use super::types::{CorrelationId, ExecType, OrderId, OrderType, Side, Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of a [`TradingEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    NewOrder,
    CancelOrder,
    ExecutionReport,
    MarketDataTick,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewOrder => "NewOrder",
            EventKind::CancelOrder => "CancelOrder",
            EventKind::ExecutionReport => "ExecutionReport",
            EventKind::MarketDataTick => "MarketDataTick",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Whole units
    pub quantity: u64,
    /// Fixed-point (9 decimals); zero for market orders
    pub price: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelOrder {
    /// Order being cancelled
    pub order_id: OrderId,
    pub symbol: Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub exec_type: ExecType,
    pub last_quantity: u64,
    pub last_price: u64,
    pub leaves_quantity: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketDataTick {
    pub symbol: Symbol,
    pub bid_price: u64,
    pub bid_quantity: u64,
    pub ask_price: u64,
    pub ask_quantity: u64,
}

/// Payload variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPayload {
    NewOrder(NewOrder),
    CancelOrder(CancelOrder),
    ExecutionReport(ExecutionReport),
    MarketDataTick(MarketDataTick),
}

/// A trading event flowing through the pipeline
///
/// `sequence` is zero until the event is published; the ring assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingEvent {
    pub sequence: u64,
    pub timestamp_ns: u64,
    pub correlation_id: CorrelationId,
    pub payload: EventPayload,
}

impl TradingEvent {
    /// Create an unsequenced event
    pub fn new(correlation_id: CorrelationId, timestamp_ns: u64, payload: EventPayload) -> Self {
        Self {
            sequence: 0,
            timestamp_ns,
            correlation_id,
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::NewOrder(_) => EventKind::NewOrder,
            EventPayload::CancelOrder(_) => EventKind::CancelOrder,
            EventPayload::ExecutionReport(_) => EventKind::ExecutionReport,
            EventPayload::MarketDataTick(_) => EventKind::MarketDataTick,
        }
    }

    pub fn symbol(&self) -> Symbol {
        match &self.payload {
            EventPayload::NewOrder(o) => o.symbol,
            EventPayload::CancelOrder(c) => c.symbol,
            EventPayload::ExecutionReport(r) => r.symbol,
            EventPayload::MarketDataTick(t) => t.symbol,
        }
    }

    /// Order id for order-scoped events
    pub fn order_id(&self) -> Option<OrderId> {
        match &self.payload {
            EventPayload::NewOrder(o) => Some(o.order_id),
            EventPayload::CancelOrder(c) => Some(c.order_id),
            EventPayload::ExecutionReport(r) => Some(r.order_id),
            EventPayload::MarketDataTick(_) => None,
        }
    }
}

/// Processing disposition stamped by stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    #[default]
    Pending,
    Rejected {
        stage: &'static str,
        reason: RejectReason,
    },
}

/// Reusable holder for one event, bound to ring index `sequence & mask`
///
/// Allocated once when the ring is built and overwritten on every wrap.
#[derive(Debug, Clone, Default)]
pub struct EventSlot {
    event: Option<TradingEvent>,
    ingest_ns: u64,
    producer: u16,
    disposition: Disposition,
}

impl EventSlot {
    /// Overwrite the slot with a freshly claimed event
    ///
    /// Stamps the sequence number onto the event and clears any
    /// disposition left from the previous lap.
    pub fn fill(&mut self, sequence: u64, mut event: TradingEvent, producer: u16, ingest_ns: u64) {
        event.sequence = sequence;
        self.event = Some(event);
        self.ingest_ns = ingest_ns;
        self.producer = producer;
        self.disposition = Disposition::Pending;
    }

    /// Drop the payload (used when a claim is abandoned)
    pub fn clear(&mut self) {
        self.event = None;
        self.disposition = Disposition::Pending;
    }

    pub fn event(&self) -> Option<&TradingEvent> {
        self.event.as_ref()
    }

    pub fn event_mut(&mut self) -> Option<&mut TradingEvent> {
        self.event.as_mut()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.event.as_ref().map(|e| e.sequence)
    }

    pub fn ingest_ns(&self) -> u64 {
        self.ingest_ns
    }

    pub fn producer(&self) -> u16 {
        self.producer
    }

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.disposition, Disposition::Rejected { .. })
    }

    /// Mark the event rejected; the first rejection wins
    pub fn reject(&mut self, stage: &'static str, reason: RejectReason) {
        if !self.is_rejected() {
            self.disposition = Disposition::Rejected { stage, reason };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reject::ValidationFailure;

    fn sample_order() -> TradingEvent {
        TradingEvent::new(
            CorrelationId(42),
            1_000,
            EventPayload::NewOrder(NewOrder {
                order_id: OrderId(1),
                symbol: Symbol::new("X").unwrap(),
                side: Side::Buy,
                order_type: OrderType::Limit,
                quantity: 100,
                price: 5_000_000_000,
            }),
        )
    }

    #[test]
    fn test_event_accessors() {
        let event = sample_order();
        assert_eq!(event.kind(), EventKind::NewOrder);
        assert_eq!(event.symbol().as_str(), "X");
        assert_eq!(event.order_id(), Some(OrderId(1)));
        assert_eq!(event.sequence, 0);
    }

    #[test]
    fn test_slot_fill_resets_disposition() {
        let mut slot = EventSlot::default();
        slot.fill(1, sample_order(), 3, 77);
        slot.reject("validation", ValidationFailure::ZeroQuantity.into());
        assert!(slot.is_rejected());

        // Next lap overwrites in place
        slot.fill(9, sample_order(), 3, 88);
        assert!(!slot.is_rejected());
        assert_eq!(slot.sequence(), Some(9));
        assert_eq!(slot.ingest_ns(), 88);
        assert_eq!(slot.producer(), 3);
    }

    #[test]
    fn test_first_rejection_wins() {
        let mut slot = EventSlot::default();
        slot.fill(1, sample_order(), 0, 0);
        slot.reject("validation", ValidationFailure::ZeroQuantity.into());
        slot.reject("router", RejectReason::StageFault);

        match slot.disposition() {
            Disposition::Rejected { stage, .. } => assert_eq!(stage, "validation"),
            Disposition::Pending => panic!("Expected rejection"),
        }
    }
}
