//! Conduit Core - Sequenced Order-Event Pipeline
//!
//! Conduit moves trading events (new orders, cancels, execution reports,
//! market data ticks) from wire sessions through a fixed chain of
//! processing stages over a pre-allocated ring buffer.
//!
//! ## Architecture
//! - **Pre-allocated ring**: power-of-two slots, reused in place, no per-event allocation
//! - **Sequence gating**: each stage waits on its predecessor, the producer on the slowest stage
//! - **One thread per stage**: stages hold mutable state without locks
//! - **Rejections as values**: a rejected event keeps flowing to Audit
//! - **Typestate sessions**: illegal FIX session transitions are unrepresentable
//!
//! ```text
//!   FIX bytes ─▶ SessionIngress ─▶ ProducerHandle ─▶ RingBuffer
//!                                                       │
//!        Validation ─▶ RiskCheck ─▶ Router ─▶ Audit ◀───┘
//!                                    │          │
//!                           SessionGateway   AuditSink
//! ```
//!
//! ## Core Modules
//! - `core`: events, slots, reject reasons, session FSM, errors
//! - `ring`: sequences, sequencer, barriers, wait strategies
//! - `stage`: the `Stage` trait, the runner loop and the four standard stages
//! - `pipeline`: builder, lifecycle (start / drain / stop) and producers
//! - `gateway`: FIX codec, session handling, idempotent send
//! - `audit`: audit records and sinks
//! - `metrics`: `MetricsSink` boundary and Prometheus registry

pub mod audit;
pub mod config;
pub mod core;
pub mod gateway;
pub mod metrics;
pub mod perf;
pub mod pipeline;
pub mod resilience;
pub mod ring;
pub mod stage;
pub mod utils;

// Re-export core types
pub use core::{
    CorrelationId, EventKind, EventPayload, EventSlot, OrderId, RejectReason, SessionPhase,
    SessionState, Side, Symbol, TradingEvent,
};

pub use config::PipelineConfig;
pub use pipeline::{Pipeline, PipelineBuilder, PipelineReport, PipelineState, ProducerHandle};
pub use stage::{Stage, StageOutcome};

// Re-export error types
pub use core::{PipelineError, PublishError};
pub use anyhow::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    // Events
    pub use crate::core::{
        fixed_point, CancelOrder, CorrelationId, EventPayload, ExecType, ExecutionReport,
        MarketDataTick, NewOrder, OrderId, OrderType, Side, Symbol, TradingEvent,
    };

    // Pipeline
    pub use crate::config::PipelineConfig;
    pub use crate::pipeline::{Pipeline, PipelineBuilder, ProducerHandle, SessionIngress};
    pub use crate::stage::{Stage, StageOutcome};

    // Boundaries
    pub use crate::audit::{AuditSink, MemoryAuditSink};
    pub use crate::gateway::{DedupGateway, FixSession, SessionGateway};
    pub use crate::metrics::{MetricsSink, NoopMetrics, PrometheusMetrics};

    // Error types
    pub use crate::core::{PipelineError, PublishError};
}
