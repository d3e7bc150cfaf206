//! Schema and field-range checks
//!
//! Stateless: every decision depends only on the event and the configured
//! limits. Rejected events never reach RiskCheck or Router.

use super::{names as stage_names, Stage, StageOutcome};
use crate::config::ValidationConfig;
use crate::core::{EventPayload, EventSlot, OrderType, TradingEvent, ValidationFailure};
use crate::metrics::{names, MetricsSink};
use std::sync::Arc;

pub struct Validation {
    max_quantity: u64,
    max_price: u64,
    metrics: Arc<dyn MetricsSink>,
}

impl Validation {
    pub fn new(config: &ValidationConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            max_quantity: config.max_quantity,
            max_price: config.max_price,
            metrics,
        }
    }

    /// First failing rule for `event`, if any
    pub fn check(&self, event: &TradingEvent) -> Result<(), ValidationFailure> {
        if event.correlation_id.is_none() {
            return Err(ValidationFailure::MissingCorrelationId);
        }
        if event.symbol().is_empty() {
            return Err(ValidationFailure::EmptySymbol);
        }

        match &event.payload {
            EventPayload::NewOrder(order) => {
                if order.order_id.is_none() {
                    return Err(ValidationFailure::MissingOrderId);
                }
                self.check_quantity(order.quantity)?;
                match order.order_type {
                    OrderType::Limit => self.check_price(order.price)?,
                    OrderType::Market if order.price != 0 => {
                        return Err(ValidationFailure::UnexpectedPrice { price: order.price });
                    }
                    OrderType::Market => {}
                }
            }
            EventPayload::CancelOrder(cancel) => {
                if cancel.order_id.is_none() {
                    return Err(ValidationFailure::MissingOrderId);
                }
            }
            EventPayload::ExecutionReport(report) => {
                if report.order_id.is_none() {
                    return Err(ValidationFailure::MissingOrderId);
                }
                if report.exec_type.is_fill() {
                    if report.last_quantity == 0 || report.last_price == 0 {
                        return Err(ValidationFailure::MissingFill);
                    }
                    self.check_quantity(report.last_quantity)?;
                    self.check_price(report.last_price)?;
                }
            }
            EventPayload::MarketDataTick(tick) => {
                for price in [tick.bid_price, tick.ask_price] {
                    if price > self.max_price {
                        return Err(ValidationFailure::InvalidPrice { price });
                    }
                }
                if tick.bid_price > 0 && tick.ask_price > 0 && tick.bid_price > tick.ask_price {
                    return Err(ValidationFailure::CrossedQuote {
                        bid: tick.bid_price,
                        ask: tick.ask_price,
                    });
                }
            }
        }

        Ok(())
    }

    fn check_quantity(&self, quantity: u64) -> Result<(), ValidationFailure> {
        if quantity == 0 {
            Err(ValidationFailure::ZeroQuantity)
        } else if quantity > self.max_quantity {
            Err(ValidationFailure::QuantityTooLarge {
                quantity,
                max: self.max_quantity,
            })
        } else {
            Ok(())
        }
    }

    fn check_price(&self, price: u64) -> Result<(), ValidationFailure> {
        if price == 0 || price > self.max_price {
            Err(ValidationFailure::InvalidPrice { price })
        } else {
            Ok(())
        }
    }
}

impl Stage for Validation {
    fn name(&self) -> &'static str {
        stage_names::VALIDATION
    }

    fn process_one(&mut self, slot: &mut EventSlot) -> StageOutcome {
        let Some(event) = slot.event() else {
            return StageOutcome::Forward;
        };

        match self.check(event) {
            Ok(()) => StageOutcome::Forward,
            Err(failure) => {
                self.metrics.record(names::VALIDATION_REJECTS, 1);
                StageOutcome::Reject(failure.into())
            }
        }
    }
}
