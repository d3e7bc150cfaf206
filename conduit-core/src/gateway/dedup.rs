//! At-most-once outbound sends keyed by correlation id
//!
//! After a crash-recovery replay the Router may see an event it already
//! routed. [`DedupGateway`] remembers the correlation ids of successful
//! sends and answers a repeat with [`Ack::Duplicate`] without touching the
//! wire. Memory is bounded: the oldest ids are evicted first.
//!
//! Failed sends are not remembered, so a parked event can retry.

use super::{Ack, DecodeError, SendFailure, SessionGateway};
use crate::core::{CorrelationId, TradingEvent};
use crossbeam::queue::ArrayQueue;
use dashmap::DashSet;
use tracing::debug;

pub struct DedupGateway<G: SessionGateway> {
    inner: G,
    seen: DashSet<CorrelationId>,
    /// Insertion order for eviction
    order: ArrayQueue<CorrelationId>,
}

impl<G: SessionGateway> DedupGateway<G> {
    /// Remember up to `capacity` correlation ids (minimum 1)
    pub fn new(inner: G, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            seen: DashSet::with_capacity(capacity),
            order: ArrayQueue::new(capacity),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn capacity(&self) -> usize {
        self.order.capacity()
    }

    /// Ids currently remembered
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, correlation_id: CorrelationId) -> bool {
        self.seen.contains(&correlation_id)
    }

    fn remember(&self, correlation_id: CorrelationId) {
        if !self.seen.insert(correlation_id) {
            return;
        }
        if let Some(evicted) = self.order.force_push(correlation_id) {
            self.seen.remove(&evicted);
        }
    }
}

impl<G: SessionGateway> SessionGateway for DedupGateway<G> {
    fn on_inbound_message(&self, raw: &[u8]) -> Result<Option<TradingEvent>, DecodeError> {
        self.inner.on_inbound_message(raw)
    }

    fn send_outbound(&self, event: &TradingEvent) -> Result<Ack, SendFailure> {
        let id = event.correlation_id;
        if id.is_none() {
            return self.inner.send_outbound(event);
        }

        if self.seen.contains(&id) {
            debug!(correlation_id = %id, "Suppressed duplicate send");
            return Ok(Ack::Duplicate);
        }

        let ack = self.inner.send_outbound(event)?;
        self.remember(id);
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CancelOrder, EventPayload, OrderId, Symbol};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<CorrelationId>>,
        failing: AtomicBool,
    }

    impl SessionGateway for Recording {
        fn on_inbound_message(&self, _raw: &[u8]) -> Result<Option<TradingEvent>, DecodeError> {
            Ok(None)
        }

        fn send_outbound(&self, event: &TradingEvent) -> Result<Ack, SendFailure> {
            if self.failing.load(Ordering::Relaxed) {
                return Err(SendFailure::Busy);
            }
            self.sent.lock().push(event.correlation_id);
            Ok(Ack::Sent)
        }
    }

    fn cancel(correlation: u64) -> TradingEvent {
        TradingEvent::new(
            CorrelationId(correlation),
            0,
            EventPayload::CancelOrder(CancelOrder {
                order_id: OrderId(1),
                symbol: Symbol::new("X").unwrap(),
            }),
        )
    }

    #[test]
    fn test_replay_sends_once() {
        let gateway = DedupGateway::new(Recording::default(), 8);

        assert_eq!(gateway.send_outbound(&cancel(1)), Ok(Ack::Sent));
        assert_eq!(gateway.send_outbound(&cancel(1)), Ok(Ack::Duplicate));
        assert_eq!(gateway.send_outbound(&cancel(2)), Ok(Ack::Sent));

        assert_eq!(*gateway.inner().sent.lock(), vec![CorrelationId(1), CorrelationId(2)]);
    }

    #[test]
    fn test_failed_send_can_retry() {
        let gateway = DedupGateway::new(Recording::default(), 8);
        gateway.inner().failing.store(true, Ordering::Relaxed);
        assert_eq!(gateway.send_outbound(&cancel(1)), Err(SendFailure::Busy));
        assert!(!gateway.contains(CorrelationId(1)));

        gateway.inner().failing.store(false, Ordering::Relaxed);
        assert_eq!(gateway.send_outbound(&cancel(1)), Ok(Ack::Sent));
    }

    #[test]
    fn test_oldest_ids_evicted() {
        let gateway = DedupGateway::new(Recording::default(), 2);
        for id in 1..=3 {
            gateway.send_outbound(&cancel(id)).unwrap();
        }

        assert_eq!(gateway.len(), 2);
        assert!(!gateway.contains(CorrelationId(1)));
        assert!(gateway.contains(CorrelationId(3)));
        // Evicted id is sent again
        assert_eq!(gateway.send_outbound(&cancel(1)), Ok(Ack::Sent));
    }

    #[test]
    fn test_missing_correlation_passes_through() {
        let gateway = DedupGateway::new(Recording::default(), 2);
        gateway.send_outbound(&cancel(0)).unwrap();
        gateway.send_outbound(&cancel(0)).unwrap();
        assert_eq!(gateway.inner().sent.lock().len(), 2);
        assert!(gateway.is_empty());
    }
}
