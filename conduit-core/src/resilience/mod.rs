//! Resilience patterns for the dispatch path
//!
//! - Exponential backoff pacing for parked events
//! - Panic logging that coexists with per-stage panic isolation

pub mod backoff;
pub mod panic;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use panic::{install_panic_handler, payload_message};
