//! Core zero-overhead types for order-flow dispatch
//!
//! This module provides the fundamental building blocks carried by the ring:
//! - `TradingEvent`: Copy-only event with a tagged payload (no heap)
//! - `EventSlot`: pre-allocated, reusable ring cell
//! - `RejectReason`: business rejections as values
//! - `SessionState`: typestate lifecycle of the wire session
//! - Fixed-point price helpers and clocks

pub mod errors;
pub mod event;
pub mod reject;
pub mod session_fsm;
pub mod types;

// Re-export commonly used types
pub use errors::{BarrierError, PipelineError, PublishError, RingError, SessionError};
pub use event::{
    CancelOrder, Disposition, EventKind, EventPayload, EventSlot, ExecutionReport, MarketDataTick,
    NewOrder, TradingEvent,
};
pub use reject::{RejectCode, RejectReason, RiskViolation, ValidationFailure};
pub use session_fsm::{
    LogoutInitiator, SessionDrop, SessionEvent, SessionPhase, SessionState,
};
pub use types::{clock, fixed_point, CorrelationId, ExecType, OrderId, OrderType, Side, Symbol};
