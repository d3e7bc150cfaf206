//! Wire session boundary
//!
//! ```text
//!   bytes ──▶ SessionGateway::on_inbound_message ──▶ TradingEvent ──▶ ring
//!                         │
//!                         └─ Logon / Logout / Heartbeat handled here
//!
//!   Router ──▶ SessionGateway::send_outbound ──▶ OutboundTransport ──▶ wire
//! ```
//!
//! - [`FixSession`]: FIX 4.4 tag=value session owning the [`SessionState`](crate::core::SessionState)
//! - [`SessionGate`]: atomic mirror of the session phase read by producers
//! - [`DedupGateway`]: at-most-once sends keyed by correlation id
//! - [`ChannelTransport`]: outbound frames onto a bounded channel

pub mod dedup;
pub mod fix;
pub mod session;
pub mod transport;

pub use dedup::DedupGateway;
pub use fix::{FixCodec, FixMessage};
pub use session::{FixSession, SessionGate};
pub use transport::{ChannelTransport, OutboundTransport};

use crate::core::{SessionError, SessionPhase, TradingEvent};
use std::sync::Arc;
use thiserror::Error;

/// Successful outbound send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Handed to the transport
    Sent,
    /// Already sent under this correlation id; nothing was written
    Duplicate,
}

/// Inbound bytes that could not become an event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty message")]
    Empty,

    #[error("malformed field at byte {offset}")]
    MalformedField { offset: usize },

    #[error("missing required tag {tag}")]
    MissingTag { tag: u32 },

    #[error("invalid value for tag {tag}: {value:?}")]
    InvalidValue { tag: u32, value: String },

    #[error("checksum mismatch: message says {declared}, computed {computed}")]
    ChecksumMismatch { declared: u8, computed: u8 },

    #[error("unsupported message type {msg_type:?}")]
    UnsupportedMsgType { msg_type: String },

    /// Application message received outside an Active session
    #[error("application message while session is {phase}")]
    SessionNotActive { phase: SessionPhase },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Transient outbound failure; the Router parks and retries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendFailure {
    #[error("session is {phase}; cannot send")]
    SessionNotActive { phase: SessionPhase },

    #[error("outbound transport is full")]
    Busy,

    #[error("outbound transport disconnected")]
    Disconnected,

    #[error("{kind} events are not sent outbound")]
    Unsupported { kind: &'static str },
}

/// Consumed wire-session collaborator
///
/// Called concurrently: `on_inbound_message` from the ingress thread and
/// `send_outbound` from the Router stage.
pub trait SessionGateway: Send + Sync {
    /// Decode one inbound message
    ///
    /// `Ok(None)` means a session-level message was consumed and nothing
    /// should be published.
    fn on_inbound_message(&self, raw: &[u8]) -> Result<Option<TradingEvent>, DecodeError>;

    fn send_outbound(&self, event: &TradingEvent) -> Result<Ack, SendFailure>;
}

impl<G: SessionGateway + ?Sized> SessionGateway for Arc<G> {
    fn on_inbound_message(&self, raw: &[u8]) -> Result<Option<TradingEvent>, DecodeError> {
        (**self).on_inbound_message(raw)
    }

    fn send_outbound(&self, event: &TradingEvent) -> Result<Ack, SendFailure> {
        (**self).send_outbound(event)
    }
}
