//! Order status tracking for execution reports
//!
//! A table-driven state machine: each (status, exec type) pair either maps
//! to a next status or is illegal. The Router reflects every execution
//! report through it; illegal transitions are reported to the caller and
//! leave the order unchanged.
//!
//! ```text
//!   New ──▶ Open ──▶ PartiallyFilled ──▶ Filled
//!    │       │  │          │  ▲ │
//!    │       │  └──────────┼──┘ └──▶ Cancelled
//!    │       └─────────────┴───────▶ Cancelled
//!    └──▶ Rejected / Filled / PartiallyFilled
//! ```

use crate::core::{ExecType, OrderId};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Sent, not yet acknowledged by the venue
    New,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "New",
            OrderStatus::Open => "Open",
            OrderStatus::PartiallyFilled => "PartiallyFilled",
            OrderStatus::Filled => "Filled",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Transition table
    fn next(self, exec: ExecType) -> Option<OrderStatus> {
        use OrderStatus::*;
        match (self, exec) {
            (New, ExecType::New) => Some(Open),
            (New, ExecType::Rejected) => Some(Rejected),
            (New | Open | PartiallyFilled, ExecType::PartialFill) => Some(PartiallyFilled),
            (New | Open | PartiallyFilled, ExecType::Fill) => Some(Filled),
            (Open | PartiallyFilled, ExecType::Canceled) => Some(Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn exec_name(exec: ExecType) -> &'static str {
    match exec {
        ExecType::New => "New",
        ExecType::PartialFill => "PartialFill",
        ExecType::Fill => "Fill",
        ExecType::Canceled => "Canceled",
        ExecType::Rejected => "Rejected",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OrderTransitionError {
    #[error("no transition from {from} on {exec} for order {order_id}")]
    Illegal {
        order_id: OrderId,
        from: &'static str,
        exec: &'static str,
    },

    #[error("execution report {exec} for unknown order {order_id}")]
    UnknownOrder {
        order_id: OrderId,
        exec: &'static str,
    },
}

/// Last known status of every routed order
///
/// Terminal orders are evicted so the table only holds live orders.
#[derive(Debug, Default)]
pub struct OrderTracker {
    orders: HashMap<OrderId, OrderStatus>,
    completed: u64,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an order that was just sent
    pub fn track(&mut self, order_id: OrderId) {
        self.orders.insert(order_id, OrderStatus::New);
    }

    pub fn status(&self, order_id: OrderId) -> Option<OrderStatus> {
        self.orders.get(&order_id).copied()
    }

    pub fn live_orders(&self) -> usize {
        self.orders.len()
    }

    /// Orders that reached a terminal status
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Apply an execution report and return the new status
    pub fn apply(
        &mut self,
        order_id: OrderId,
        exec: ExecType,
    ) -> Result<OrderStatus, OrderTransitionError> {
        let Some(current) = self.orders.get(&order_id).copied() else {
            return Err(OrderTransitionError::UnknownOrder {
                order_id,
                exec: exec_name(exec),
            });
        };

        let next = current.next(exec).ok_or(OrderTransitionError::Illegal {
            order_id,
            from: current.as_str(),
            exec: exec_name(exec),
        })?;

        if next.is_terminal() {
            self.orders.remove(&order_id);
            self.completed += 1;
        } else {
            self.orders.insert(order_id, next);
        }
        Ok(next)
    }
}
