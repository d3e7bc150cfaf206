//! FIX session: owns the [`SessionState`] and publishes its phase
//!
//! Every state change happens under the session lock and is mirrored into
//! the [`SessionGate`] before the lock is released, so a producer reading
//! the gate never sees a phase the session has already left.

use super::fix::{msg_types, tags, FixCodec, FixMessage};
use super::{Ack, DecodeError, OutboundTransport, SendFailure, SessionGateway};
use crate::config::GatewayConfig;
use crate::core::{
    CorrelationId, EventPayload, LogoutInitiator, SessionDrop, SessionError, SessionEvent,
    SessionPhase, SessionState, TradingEvent,
};
use crate::metrics::{names, MetricsSink};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Heartbeat interval advertised on Logon (seconds)
const HEARTBEAT_INTERVAL_SECS: u32 = 30;

/// Lock-free view of a session's phase
///
/// Cloned into every producer bound to the session; publishing is allowed
/// only while the phase is Active.
#[derive(Debug, Clone)]
pub struct SessionGate {
    session_id: u16,
    phase: Arc<AtomicU8>,
}

impl SessionGate {
    pub fn new(session_id: u16) -> Self {
        Self {
            session_id,
            phase: Arc::new(AtomicU8::new(SessionPhase::Disconnected as u8)),
        }
    }

    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    #[inline]
    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.phase() == SessionPhase::Active
    }

    pub fn set(&self, phase: SessionPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

pub struct FixSession<T: OutboundTransport> {
    codec: FixCodec,
    state: Mutex<SessionState>,
    gate: SessionGate,
    /// Next outbound MsgSeqNum; survives re-logon
    outbound_seq: AtomicU64,
    transport: T,
    metrics: Arc<dyn MetricsSink>,
}

impl<T: OutboundTransport> FixSession<T> {
    pub fn new(
        config: &GatewayConfig,
        session_id: u16,
        transport: T,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let codec = FixCodec::new(config.sender_comp_id.clone(), config.target_comp_id.clone());
        Self::with_codec(codec, session_id, transport, metrics)
    }

    pub fn with_codec(
        codec: FixCodec,
        session_id: u16,
        transport: T,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            codec,
            state: Mutex::new(SessionState::new(session_id)),
            gate: SessionGate::new(session_id),
            outbound_seq: AtomicU64::new(1),
            transport,
            metrics,
        }
    }

    /// Gate to bind producers to
    pub fn gate(&self) -> SessionGate {
        self.gate.clone()
    }

    pub fn session_id(&self) -> u16 {
        self.gate.session_id()
    }

    pub fn phase(&self) -> SessionPhase {
        self.gate.phase()
    }

    /// Snapshot of the full state (counters, timestamps)
    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Initiate a logon: Disconnected -> LogonPending
    pub fn logon(&self) -> Result<(), SessionError> {
        self.transition(SessionEvent::LogonAttempt)?;
        self.send_session_message(
            msg_types::LOGON,
            &[(tags::HEART_BT_INT, HEARTBEAT_INTERVAL_SECS.to_string())],
        );
        Ok(())
    }

    /// Request a logout: Active -> LogoutPending
    pub fn logout(&self) -> Result<(), SessionError> {
        self.transition(SessionEvent::LogoutRequest(LogoutInitiator::Local))?;
        self.send_session_message(msg_types::LOGOUT, &[]);
        Ok(())
    }

    /// The connection was lost
    ///
    /// Returns the drop signal when the session was live; producers bound
    /// to the gate are paused from this point on.
    pub fn transport_failed(&self) -> Result<Option<SessionDrop>, SessionError> {
        self.transition(SessionEvent::TransportFailure)
    }

    fn transition(&self, event: SessionEvent) -> Result<Option<SessionDrop>, SessionError> {
        let (from, to, signal) = {
            let mut state = self.state.lock();
            let from = state.phase();
            let signal = state.on_event(event)?;
            self.gate.set(state.phase());
            (from, state.phase(), signal)
        };

        info!(
            session = self.session_id(),
            "Session {} -> {} on {}",
            from,
            to,
            event.as_str()
        );

        if let Some(dropped) = signal {
            warn!(
                session = dropped.session_id,
                from = %dropped.from,
                "Session dropped; producers paused until logon"
            );
            self.metrics.record(names::SESSION_DROPS, 1);
        }
        Ok(signal)
    }

    fn next_seq_num(&self) -> u64 {
        self.outbound_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn send_session_message(&self, msg_type: &str, body: &[(u32, String)]) {
        let frame = self.codec.encode(msg_type, self.next_seq_num(), body);
        if let Err(e) = self.transport.send(&frame) {
            warn!(
                session = self.session_id(),
                msg_type, "Failed to send session message: {}", e
            );
        }
    }

    fn on_logon(&self) -> Result<(), SessionError> {
        let acceptor = {
            let mut state = self.state.lock();
            let acceptor = state.phase() == SessionPhase::Disconnected;
            if acceptor {
                state.on_event(SessionEvent::LogonAttempt)?;
            }
            state.on_event(SessionEvent::LogonAck)?;
            self.gate.set(state.phase());
            acceptor
        };

        info!(session = self.session_id(), acceptor, "Session active");
        if acceptor {
            self.send_session_message(
                msg_types::LOGON,
                &[(tags::HEART_BT_INT, HEARTBEAT_INTERVAL_SECS.to_string())],
            );
        }
        Ok(())
    }

    fn on_logout(&self) -> Result<(), SessionError> {
        let reply = {
            let mut state = self.state.lock();
            let reply = match state.phase() {
                SessionPhase::Active => {
                    state.on_event(SessionEvent::LogoutRequest(LogoutInitiator::Counterparty))?;
                    true
                }
                SessionPhase::LogoutPending => false,
                _ => {
                    return Err(SessionError::InvalidTransition {
                        state: state.state_name(),
                        event: "LogoutRequest",
                    })
                }
            };
            state.on_event(SessionEvent::LogoutComplete)?;
            self.gate.set(state.phase());
            reply
        };

        info!(session = self.session_id(), "Session logged out");
        if reply {
            self.send_session_message(msg_types::LOGOUT, &[]);
        }
        Ok(())
    }
}

impl<T: OutboundTransport> SessionGateway for FixSession<T> {
    fn on_inbound_message(&self, raw: &[u8]) -> Result<Option<TradingEvent>, DecodeError> {
        let msg = FixMessage::parse(raw)?;

        match msg.msg_type()? {
            b"A" => {
                self.on_logon()?;
                Ok(None)
            }
            b"5" => {
                self.on_logout()?;
                Ok(None)
            }
            b"0" => {
                debug!(session = self.session_id(), "Heartbeat");
                Ok(None)
            }
            _ => {
                let epoch = {
                    let state = self.state.lock();
                    let phase = state.phase();
                    if phase != SessionPhase::Active {
                        return Err(DecodeError::SessionNotActive { phase });
                    }
                    state.data().logon_count
                };
                let mut event = self.codec.decode_event(&msg)?;
                event.correlation_id =
                    CorrelationId::scoped(self.session_id(), epoch, event.correlation_id.0)
                        .ok_or_else(|| DecodeError::InvalidValue {
                            tag: tags::MSG_SEQ_NUM,
                            value: event.correlation_id.to_string(),
                        })?;
                Ok(Some(event))
            }
        }
    }

    fn send_outbound(&self, event: &TradingEvent) -> Result<Ack, SendFailure> {
        let phase = self.phase();
        if phase != SessionPhase::Active {
            return Err(SendFailure::SessionNotActive { phase });
        }

        let unsupported = SendFailure::Unsupported {
            kind: event.kind().as_str(),
        };
        if !matches!(
            event.payload,
            EventPayload::NewOrder(_) | EventPayload::CancelOrder(_)
        ) {
            return Err(unsupported);
        }

        let frame = self
            .codec
            .encode_event(event, self.next_seq_num())
            .ok_or(unsupported)?;
        self.transport.send(&frame)?;
        Ok(Ack::Sent)
    }
}
