//! Pre-trade risk checks with single-writer state
//!
//! [`RiskState`] is owned by the RiskCheck stage and only ever touched from
//! its thread, so it carries no locks. Because the stage sees events in
//! sequence order, a NewOrder is always applied before a later Cancel or
//! fill for the same order id is evaluated.
//!
//! Checks for a NewOrder, in order:
//! 1. Duplicate order id
//! 2. Order quantity limit
//! 3. Order notional limit (limit orders)
//! 4. Open order count
//! 5. Projected net position, counting open orders on the same side

use super::{names as stage_names, Stage, StageOutcome};
use crate::config::RiskConfig;
use crate::core::{
    fixed_point, CancelOrder, EventPayload, EventSlot, ExecType, ExecutionReport, NewOrder,
    OrderId, OrderType, RiskViolation, Side, Symbol,
};
use crate::metrics::{names, MetricsSink};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Limits in the units the checks compare against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskLimits {
    pub max_order_quantity: u64,
    /// Fixed-point (quantity x price, 9 decimals)
    pub max_order_notional: u128,
    pub max_position: i64,
    pub max_open_orders: usize,
}

impl From<&RiskConfig> for RiskLimits {
    fn from(config: &RiskConfig) -> Self {
        Self {
            max_order_quantity: config.max_order_quantity,
            max_order_notional: config.max_order_notional as u128 * fixed_point::SCALE as u128,
            max_position: config.max_position,
            max_open_orders: config.max_open_orders,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenOrder {
    symbol: Symbol,
    side: Side,
    remaining: u64,
}

/// Unfilled quantity resting on each side of a symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Exposure {
    buy: u64,
    sell: u64,
}

impl Exposure {
    fn side_mut(&mut self, side: Side) -> &mut u64 {
        match side {
            Side::Buy => &mut self.buy,
            Side::Sell => &mut self.sell,
        }
    }
}

/// Positions and open orders
#[derive(Debug, Default)]
pub struct RiskState {
    positions: HashMap<Symbol, i64>,
    open_orders: HashMap<OrderId, OpenOrder>,
    exposure: HashMap<Symbol, Exposure>,
}

impl RiskState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Net filled position (positive = long)
    pub fn position(&self, symbol: &Symbol) -> i64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }

    pub fn open_order_count(&self) -> usize {
        self.open_orders.len()
    }

    pub fn is_open(&self, order_id: OrderId) -> bool {
        self.open_orders.contains_key(&order_id)
    }

    /// Unfilled quantity on `side` of `symbol`
    pub fn open_quantity(&self, symbol: &Symbol, side: Side) -> u64 {
        self.exposure
            .get(symbol)
            .map(|e| match side {
                Side::Buy => e.buy,
                Side::Sell => e.sell,
            })
            .unwrap_or(0)
    }

    /// Check a new order against `limits` and, if it passes, record it
    pub fn apply_new_order(
        &mut self,
        order: &NewOrder,
        limits: &RiskLimits,
    ) -> Result<(), RiskViolation> {
        if self.open_orders.contains_key(&order.order_id) {
            return Err(RiskViolation::DuplicateOrder {
                order_id: order.order_id,
            });
        }

        if order.quantity > limits.max_order_quantity {
            return Err(RiskViolation::OrderQuantityExceeded {
                quantity: order.quantity,
                limit: limits.max_order_quantity,
            });
        }

        if order.order_type == OrderType::Limit {
            let notional = order.quantity as u128 * order.price as u128;
            if notional > limits.max_order_notional {
                return Err(RiskViolation::NotionalExceeded {
                    notional,
                    limit: limits.max_order_notional,
                });
            }
        }

        if self.open_orders.len() >= limits.max_open_orders {
            return Err(RiskViolation::OpenOrderLimit {
                open: self.open_orders.len(),
                limit: limits.max_open_orders,
            });
        }

        // Worst case: every open order on this side fills, plus this one
        let open_same_side = self.open_quantity(&order.symbol, order.side);
        let projected = self.position(&order.symbol) as i128
            + order.side.sign() as i128 * (open_same_side as i128 + order.quantity as i128);
        if projected.unsigned_abs() > limits.max_position.unsigned_abs() as u128 {
            return Err(RiskViolation::PositionLimitExceeded {
                symbol: order.symbol,
                projected: projected.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
                limit: limits.max_position,
            });
        }

        self.open_orders.insert(
            order.order_id,
            OpenOrder {
                symbol: order.symbol,
                side: order.side,
                remaining: order.quantity,
            },
        );
        *self
            .exposure
            .entry(order.symbol)
            .or_default()
            .side_mut(order.side) += order.quantity;

        Ok(())
    }

    /// Release the exposure of a known order
    pub fn apply_cancel(&mut self, cancel: &CancelOrder) -> Result<(), RiskViolation> {
        match self.open_orders.remove(&cancel.order_id) {
            Some(open) => {
                self.release(&open, open.remaining);
                Ok(())
            }
            None => Err(RiskViolation::UnknownOrder {
                order_id: cancel.order_id,
            }),
        }
    }

    /// Move filled quantity from open exposure into position
    ///
    /// Execution reports are facts from the venue and are never rejected;
    /// fills for untracked orders still move the position. Positions
    /// saturate at the `i64` range.
    pub fn apply_execution(&mut self, report: &ExecutionReport) {
        if report.exec_type.is_fill() {
            let quantity = i64::try_from(report.last_quantity).unwrap_or(i64::MAX);
            let position = self.positions.entry(report.symbol).or_insert(0);
            *position = match position.checked_add(report.side.sign() * quantity) {
                Some(updated) => updated,
                None => {
                    warn!(
                        symbol = %report.symbol,
                        order_id = %report.order_id,
                        "Fill overflows position; saturating"
                    );
                    position.saturating_add(report.side.sign() * quantity)
                }
            };
        }

        let Some(mut open) = self.open_orders.get(&report.order_id).copied() else {
            return;
        };

        let terminal = match report.exec_type {
            ExecType::New => false,
            ExecType::PartialFill | ExecType::Fill => {
                let filled = report.last_quantity.min(open.remaining);
                self.release(&open, filled);
                open.remaining -= filled;
                report.exec_type == ExecType::Fill || open.remaining == 0
            }
            ExecType::Canceled | ExecType::Rejected => {
                self.release(&open, open.remaining);
                true
            }
        };

        if terminal {
            self.open_orders.remove(&report.order_id);
        } else {
            self.open_orders.insert(report.order_id, open);
        }
    }

    fn release(&mut self, open: &OpenOrder, quantity: u64) {
        if let Some(exposure) = self.exposure.get_mut(&open.symbol) {
            let side = exposure.side_mut(open.side);
            *side = side.saturating_sub(quantity);
        }
    }
}

/// RiskCheck stage: owns the process-wide [`RiskState`]
pub struct RiskCheck {
    limits: RiskLimits,
    state: RiskState,
    metrics: Arc<dyn MetricsSink>,
}

impl RiskCheck {
    pub fn new(config: &RiskConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            limits: RiskLimits::from(config),
            state: RiskState::new(),
            metrics,
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }
}

impl Stage for RiskCheck {
    fn name(&self) -> &'static str {
        stage_names::RISK_CHECK
    }

    fn process_one(&mut self, slot: &mut EventSlot) -> StageOutcome {
        let Some(event) = slot.event() else {
            return StageOutcome::Forward;
        };

        let result = match &event.payload {
            EventPayload::NewOrder(order) => self.state.apply_new_order(order, &self.limits),
            EventPayload::CancelOrder(cancel) => self.state.apply_cancel(cancel),
            EventPayload::ExecutionReport(report) => {
                self.state.apply_execution(report);
                Ok(())
            }
            EventPayload::MarketDataTick(_) => Ok(()),
        };

        match result {
            Ok(()) => StageOutcome::Forward,
            Err(violation) => {
                self.metrics.record(names::RISK_REJECTS, 1);
                StageOutcome::Reject(violation.into())
            }
        }
    }

    fn on_shutdown(&mut self) {
        info!(
            open_orders = self.state.open_order_count(),
            symbols = self.state.positions.len(),
            "Risk state at shutdown"
        );
    }
}
