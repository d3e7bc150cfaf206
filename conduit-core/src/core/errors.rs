//! Domain-specific error types for the dispatch pipeline
//!
//! Business rejections are not errors (see [`RejectReason`](super::RejectReason)).
//! These types cover the operational failures: producer backpressure,
//! halted rings, paused sessions, lifecycle misuse and drain timeouts.

use std::time::Duration;
use thiserror::Error;

/// Producer-side ring failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// Publishing `sequence` would overwrite a slot the slowest gating
    /// consumer has not released yet
    #[error("backpressure: sequence {sequence} would overwrite an unreleased slot (capacity {capacity})")]
    Backpressure { sequence: u64, capacity: usize },

    /// The ring was halted while the producer waited for space
    #[error("ring halted")]
    Halted,
}

/// Consumer-side barrier failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BarrierError {
    /// Shutdown was signalled while waiting
    #[error("barrier alerted")]
    Alerted,
}

/// Failures returned by [`ProducerHandle::publish`](crate::pipeline::ProducerHandle::publish)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error(transparent)]
    Ring(#[from] RingError),

    /// The producer's session is not Active (logon pending or dropped)
    #[error("session {session} is not active; publishing paused")]
    SessionPaused { session: u16 },

    /// The pipeline is draining or stopped
    #[error("pipeline is not accepting new events")]
    NotAccepting,
}

/// Pipeline lifecycle failures
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Stages did not catch up with the producer cursor in time
    #[error("drain timed out after {elapsed:?}: cursor at {cursor}, slowest stage at {slowest}")]
    DrainTimeout {
        cursor: u64,
        slowest: u64,
        elapsed: Duration,
    },

    #[error("invalid pipeline state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },

    /// Single-producer rings hand out exactly one producer handle
    #[error("single-producer ring already has a producer")]
    ProducerAlreadyClaimed,

    #[error("pipeline has no stages")]
    NoStages,

    #[error("failed to spawn stage thread '{stage}': {source}")]
    Spawn {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Session state machine misuse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no transition from {state} on {event}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backpressure_display() {
        let err = RingError::Backpressure {
            sequence: 9,
            capacity: 8,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("backpressure"));
        assert!(msg.contains("capacity 8"));
    }

    #[test]
    fn test_publish_error_from_ring() {
        let err: PublishError = RingError::Halted.into();
        assert_eq!(err, PublishError::Ring(RingError::Halted));
        assert_eq!(format!("{}", err), "ring halted");
    }

    #[test]
    fn test_drain_timeout_display() {
        let err = PipelineError::DrainTimeout {
            cursor: 100,
            slowest: 42,
            elapsed: Duration::from_millis(5),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("cursor at 100"));
        assert!(msg.contains("slowest stage at 42"));
    }
}
