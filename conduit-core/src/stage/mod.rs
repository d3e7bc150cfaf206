//! Pipeline stages
//!
//! ```text
//!   ring ──▶ Validation ──▶ RiskCheck ──▶ Router ──▶ Audit
//!             (fields)      (limits,      (gateway   (every
//!                            positions)    sends)     outcome)
//! ```
//!
//! A stage is a plain type implementing [`Stage`]; the [`StageRunner`]
//! owns the thread, the barrier wait, panic isolation and Park retries.
//! Stages never see the ring, only the slot they currently own.

pub mod audit;
pub mod orders;
pub mod risk;
pub mod router;
pub mod runner;
pub mod validation;

pub use audit::Audit;
pub use orders::{OrderStatus, OrderTracker, OrderTransitionError};
pub use risk::{RiskCheck, RiskLimits, RiskState};
pub use router::Router;
pub use runner::{RunnerExit, RunnerSummary, StageRunner};
pub use validation::Validation;

use crate::core::{EventSlot, RejectReason};
use serde::{Deserialize, Serialize};

/// Result of processing one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Pass the event on to the next stage
    Forward,
    /// Stop the event here; later stages skip it (Audit records it)
    Reject(RejectReason),
    /// Cannot complete now (e.g. gateway busy); retry the same slot
    Park,
}

/// One ordered processing step
///
/// `process_one` is called for every slot in ascending sequence order,
/// from a single dedicated thread, so implementations may keep mutable
/// state without locks.
pub trait Stage: Send {
    fn name(&self) -> &'static str;

    fn process_one(&mut self, slot: &mut EventSlot) -> StageOutcome;

    /// Whether slots rejected upstream are still handed to this stage
    fn observes_rejected(&self) -> bool {
        false
    }

    /// Called on the stage thread before the first wait
    fn on_start(&mut self) {}

    /// Called on the stage thread after the loop exits
    fn on_shutdown(&mut self) {}
}

impl<S: Stage + ?Sized> Stage for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn process_one(&mut self, slot: &mut EventSlot) -> StageOutcome {
        (**self).process_one(slot)
    }

    fn observes_rejected(&self) -> bool {
        (**self).observes_rejected()
    }

    fn on_start(&mut self) {
        (**self).on_start()
    }

    fn on_shutdown(&mut self) {
        (**self).on_shutdown()
    }
}

/// What a panic inside `process_one` does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Reject the event with `StageFault` and keep processing
    #[default]
    FailEvent,
    /// Reject the event, stop this stage and halt the pipeline
    FailStage,
}

/// Names of the standard stages
pub mod names {
    pub const VALIDATION: &str = "validation";
    pub const RISK_CHECK: &str = "risk_check";
    pub const ROUTER: &str = "router";
    pub const AUDIT: &str = "audit";
}
