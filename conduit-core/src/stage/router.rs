//! Router: maps accepted events to outbound actions
//!
//! | Event | Action |
//! |---|---|
//! | NewOrder, CancelOrder | `SessionGateway::send_outbound`; transient failure parks |
//! | ExecutionReport | reflected into the [`OrderTracker`] |
//! | MarketDataTick | forwarded untouched |
//!
//! Transient send failures are parked; the runner retries them and
//! escalates to a reject once the retry budget is spent. An event the
//! gateway can never send is rejected at once.

use super::orders::OrderTracker;
use super::{names as stage_names, Stage, StageOutcome};
use crate::core::{EventPayload, EventSlot, RejectReason};
use crate::gateway::{Ack, SendFailure, SessionGateway};
use crate::metrics::{names, MetricsSink};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Router {
    gateway: Arc<dyn SessionGateway>,
    orders: OrderTracker,
    metrics: Arc<dyn MetricsSink>,
}

impl Router {
    pub fn new(gateway: Arc<dyn SessionGateway>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            gateway,
            orders: OrderTracker::new(),
            metrics,
        }
    }

    pub fn orders(&self) -> &OrderTracker {
        &self.orders
    }
}

impl Stage for Router {
    fn name(&self) -> &'static str {
        stage_names::ROUTER
    }

    fn process_one(&mut self, slot: &mut EventSlot) -> StageOutcome {
        let Some(event) = slot.event() else {
            return StageOutcome::Forward;
        };

        match &event.payload {
            EventPayload::NewOrder(_) | EventPayload::CancelOrder(_) => {
                match self.gateway.send_outbound(event) {
                    Ok(Ack::Sent) => {
                        if let EventPayload::NewOrder(order) = &event.payload {
                            self.orders.track(order.order_id);
                        }
                        self.metrics.record(names::SENDS, 1);
                        StageOutcome::Forward
                    }
                    Ok(Ack::Duplicate) => {
                        debug!(
                            sequence = event.sequence,
                            correlation_id = %event.correlation_id,
                            "Send already applied"
                        );
                        self.metrics.record(names::DUPLICATE_SENDS, 1);
                        StageOutcome::Forward
                    }
                    Err(SendFailure::Unsupported { kind }) => {
                        warn!(sequence = event.sequence, kind, "Gateway cannot send event");
                        self.metrics.record(names::SEND_FAILURES, 1);
                        StageOutcome::Reject(RejectReason::Unroutable { kind })
                    }
                    Err(failure) => {
                        debug!(sequence = event.sequence, "Send failed, parking: {}", failure);
                        self.metrics.record(names::SEND_FAILURES, 1);
                        StageOutcome::Park
                    }
                }
            }
            EventPayload::ExecutionReport(report) => {
                if let Err(e) = self.orders.apply(report.order_id, report.exec_type) {
                    warn!(sequence = event.sequence, "Order state violation: {}", e);
                    self.metrics.record(names::ORDER_STATE_VIOLATIONS, 1);
                }
                StageOutcome::Forward
            }
            EventPayload::MarketDataTick(_) => {
                self.metrics.record(names::TICKS_FORWARDED, 1);
                StageOutcome::Forward
            }
        }
    }

    fn on_shutdown(&mut self) {
        info!(
            live_orders = self.orders.live_orders(),
            completed_orders = self.orders.completed(),
            "Router stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        CorrelationId, ExecType, ExecutionReport, NewOrder, OrderId, OrderType, Side, Symbol,
        TradingEvent,
    };
    use crate::gateway::DecodeError;
    use crate::metrics::PrometheusMetrics;
    use crate::stage::OrderStatus;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` sends
    struct Flaky {
        failures: AtomicU32,
    }

    impl SessionGateway for Flaky {
        fn on_inbound_message(&self, _raw: &[u8]) -> Result<Option<TradingEvent>, DecodeError> {
            Ok(None)
        }

        fn send_outbound(&self, _event: &TradingEvent) -> Result<Ack, SendFailure> {
            let left = self.failures.load(Ordering::Relaxed);
            if left > 0 {
                self.failures.store(left - 1, Ordering::Relaxed);
                return Err(SendFailure::Busy);
            }
            Ok(Ack::Sent)
        }
    }

    fn router(failures: u32) -> (Router, Arc<PrometheusMetrics>) {
        let metrics = Arc::new(PrometheusMetrics::new().unwrap());
        let gateway = Arc::new(Flaky {
            failures: AtomicU32::new(failures),
        });
        (Router::new(gateway, metrics.clone()), metrics)
    }

    fn slot(payload: EventPayload) -> EventSlot {
        let mut slot = EventSlot::default();
        slot.fill(1, TradingEvent::new(CorrelationId(1), 0, payload), 0, 0);
        slot
    }

    fn new_order() -> EventPayload {
        EventPayload::NewOrder(NewOrder {
            order_id: OrderId(7),
            symbol: Symbol::new("X").unwrap(),
            side: Side::Buy,
            order_type: OrderType::Market,
            quantity: 1,
            price: 0,
        })
    }

    fn report(exec_type: ExecType) -> EventPayload {
        EventPayload::ExecutionReport(ExecutionReport {
            order_id: OrderId(7),
            symbol: Symbol::new("X").unwrap(),
            side: Side::Buy,
            exec_type,
            last_quantity: 0,
            last_price: 0,
            leaves_quantity: 1,
        })
    }

    #[test]
    fn test_send_failure_parks() {
        let (mut router, metrics) = router(1);
        let mut slot = slot(new_order());

        assert_eq!(router.process_one(&mut slot), StageOutcome::Park);
        assert_eq!(router.process_one(&mut slot), StageOutcome::Forward);
        assert_eq!(metrics.counter_value(names::SEND_FAILURES), 1);
        assert_eq!(metrics.counter_value(names::SENDS), 1);
        assert_eq!(router.orders().status(OrderId(7)), Some(OrderStatus::New));
    }

    #[test]
    fn test_execution_reports_never_reject() {
        let (mut router, metrics) = router(0);

        // Unknown order: counted, still forwarded
        assert_eq!(
            router.process_one(&mut slot(report(ExecType::New))),
            StageOutcome::Forward
        );
        assert_eq!(metrics.counter_value(names::ORDER_STATE_VIOLATIONS), 1);

        router.process_one(&mut slot(new_order()));
        router.process_one(&mut slot(report(ExecType::New)));
        assert_eq!(router.orders().status(OrderId(7)), Some(OrderStatus::Open));
    }

    struct Refusing;

    impl SessionGateway for Refusing {
        fn on_inbound_message(&self, _raw: &[u8]) -> Result<Option<TradingEvent>, DecodeError> {
            Ok(None)
        }

        fn send_outbound(&self, event: &TradingEvent) -> Result<Ack, SendFailure> {
            Err(SendFailure::Unsupported {
                kind: event.kind().as_str(),
            })
        }
    }

    #[test]
    fn test_unsupported_send_rejects_without_parking() {
        let metrics = Arc::new(PrometheusMetrics::new().unwrap());
        let mut router = Router::new(Arc::new(Refusing), metrics.clone());
        let mut slot = slot(new_order());

        match router.process_one(&mut slot) {
            StageOutcome::Reject(reason) => {
                assert!(matches!(reason, RejectReason::Unroutable { .. }));
                assert_eq!(reason.code(), crate::core::RejectCode::SendFailure);
            }
            other => panic!("expected reject, got {:?}", other),
        }
        assert_eq!(metrics.counter_value(names::SEND_FAILURES), 1);
        assert_eq!(router.orders().status(OrderId(7)), None);
    }
}
