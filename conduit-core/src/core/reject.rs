//! Business rejection reasons
//!
//! Rejections are values stamped onto an [`EventSlot`](super::EventSlot),
//! never errors: the rejecting stage still advances its sequence and the
//! Audit stage records the reason downstream.

use super::types::{OrderId, Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema / field-range failures detected by the Validation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    MissingCorrelationId,
    MissingOrderId,
    EmptySymbol,
    ZeroQuantity,
    QuantityTooLarge { quantity: u64, max: u64 },
    /// Limit price is zero or above the configured ceiling
    InvalidPrice { price: u64 },
    /// Market orders must not carry a price
    UnexpectedPrice { price: u64 },
    /// Fill report without traded quantity or price
    MissingFill,
    CrossedQuote { bid: u64, ask: u64 },
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::MissingCorrelationId => write!(f, "missing correlation id"),
            ValidationFailure::MissingOrderId => write!(f, "missing order id"),
            ValidationFailure::EmptySymbol => write!(f, "empty symbol"),
            ValidationFailure::ZeroQuantity => write!(f, "zero quantity"),
            ValidationFailure::QuantityTooLarge { quantity, max } => {
                write!(f, "quantity {} exceeds maximum {}", quantity, max)
            }
            ValidationFailure::InvalidPrice { price } => write!(f, "invalid limit price {}", price),
            ValidationFailure::UnexpectedPrice { price } => {
                write!(f, "market order carries price {}", price)
            }
            ValidationFailure::MissingFill => write!(f, "fill without quantity or price"),
            ValidationFailure::CrossedQuote { bid, ask } => {
                write!(f, "crossed quote: bid {} > ask {}", bid, ask)
            }
        }
    }
}

/// Position / exposure limit breaches detected by the RiskCheck stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskViolation {
    OrderQuantityExceeded { quantity: u64, limit: u64 },
    NotionalExceeded { notional: u128, limit: u128 },
    PositionLimitExceeded { symbol: Symbol, projected: i64, limit: i64 },
    OpenOrderLimit { open: usize, limit: usize },
    DuplicateOrder { order_id: OrderId },
    UnknownOrder { order_id: OrderId },
}

impl fmt::Display for RiskViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskViolation::OrderQuantityExceeded { quantity, limit } => {
                write!(f, "order quantity {} exceeds limit {}", quantity, limit)
            }
            RiskViolation::NotionalExceeded { notional, limit } => {
                write!(f, "order notional {} exceeds limit {}", notional, limit)
            }
            RiskViolation::PositionLimitExceeded {
                symbol,
                projected,
                limit,
            } => write!(
                f,
                "projected position {} in {} exceeds limit {}",
                projected, symbol, limit
            ),
            RiskViolation::OpenOrderLimit { open, limit } => {
                write!(f, "{} open orders (limit {})", open, limit)
            }
            RiskViolation::DuplicateOrder { order_id } => {
                write!(f, "duplicate order id {}", order_id)
            }
            RiskViolation::UnknownOrder { order_id } => write!(f, "unknown order id {}", order_id),
        }
    }
}

/// Why an event did not complete the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Validation(ValidationFailure),
    Risk(RiskViolation),
    /// A parked event exhausted its retry budget (e.g. repeated send failures)
    RetriesExhausted { attempts: u32 },
    /// The gateway can never send this event
    Unroutable { kind: &'static str },
    /// The stage panicked while processing this event
    StageFault,
}

impl RejectReason {
    pub fn code(&self) -> RejectCode {
        match self {
            RejectReason::Validation(_) => RejectCode::ValidationReject,
            RejectReason::Risk(_) => RejectCode::RiskReject,
            RejectReason::RetriesExhausted { .. } | RejectReason::Unroutable { .. } => {
                RejectCode::SendFailure
            }
            RejectReason::StageFault => RejectCode::StageFault,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Validation(v) => write!(f, "validation: {}", v),
            RejectReason::Risk(r) => write!(f, "risk: {}", r),
            RejectReason::RetriesExhausted { attempts } => {
                write!(f, "gave up after {} attempts", attempts)
            }
            RejectReason::Unroutable { kind } => write!(f, "{} events cannot be sent", kind),
            RejectReason::StageFault => write!(f, "stage fault"),
        }
    }
}

impl From<ValidationFailure> for RejectReason {
    fn from(v: ValidationFailure) -> Self {
        RejectReason::Validation(v)
    }
}

impl From<RiskViolation> for RejectReason {
    fn from(r: RiskViolation) -> Self {
        RejectReason::Risk(r)
    }
}

/// Coarse rejection category carried by audit records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectCode {
    DecodeError,
    ValidationReject,
    RiskReject,
    SendFailure,
    StageFault,
}

impl RejectCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectCode::DecodeError => "DecodeError",
            RejectCode::ValidationReject => "ValidationReject",
            RejectCode::RiskReject => "RiskReject",
            RejectCode::SendFailure => "SendFailure",
            RejectCode::StageFault => "StageFault",
        }
    }
}
