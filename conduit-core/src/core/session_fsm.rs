//! Session State Machine - Typestate Pattern
//!
//! Compile-time verified lifecycle of the wire session feeding the pipeline,
//! plus a runtime wrapper ([`SessionState`]) for code that stores the state.
//!
//! # State Diagram
//!
//! ```text
//!     DISCONNECTED ◄──────────────────────────────┐
//!           │                                     │
//!        logon()                                  │
//!           ▼                                     │
//!     LOGON_PENDING ──transport_failed()──────────┤ (SessionDrop)
//!           │                                     │
//!     acknowledged()                              │
//!           ▼                                     │
//!        ACTIVE ──────transport_failed()──────────┤ (SessionDrop)
//!           │                                     │
//!   logout requested (either side)                │
//!           ▼                                     │
//!    LOGOUT_PENDING ──complete() / failure────────┘
//! ```
//!
//! Only ACTIVE accepts publishes. A drop from ACTIVE or LOGON_PENDING
//! produces a [`SessionDrop`] signal so the pipeline pauses that session's
//! producer until ACTIVE is re-entered.

use super::errors::SessionError;
use std::fmt;
use std::time::SystemTime;

// ============================================================================
// Session Data (shared by all states)
// ============================================================================

/// Core session data shared by all states
#[derive(Debug, Clone)]
pub struct SessionData {
    /// Session identifier (also the producer id stamped on slots)
    pub session_id: u16,
    pub created_at: SystemTime,
    pub last_active_at: Option<SystemTime>,
    pub last_disconnected_at: Option<SystemTime>,
    /// Total logon attempts
    pub logon_attempts: u64,
    /// Logons that reached Active; scopes inbound MsgSeqNum
    pub logon_count: u64,
    /// Transport failures while Active or LogonPending
    pub drop_count: u64,
    /// Completed logouts
    pub logout_count: u64,
}

impl SessionData {
    pub fn new(session_id: u16) -> Self {
        Self {
            session_id,
            created_at: SystemTime::now(),
            last_active_at: None,
            last_disconnected_at: None,
            logon_attempts: 0,
            logon_count: 0,
            drop_count: 0,
            logout_count: 0,
        }
    }
}

/// Transport loss signal raised to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionDrop {
    pub session_id: u16,
    /// State the session was in when the transport failed
    pub from: SessionPhase,
}

/// Who asked for the logout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutInitiator {
    Local,
    Counterparty,
}

// ============================================================================
// State: Disconnected
// ============================================================================

/// **Valid Transitions:**
/// - `logon()` → SessionLogonPending
#[derive(Debug, Clone)]
pub struct SessionDisconnected {
    data: SessionData,
}

impl SessionDisconnected {
    pub fn new(session_id: u16) -> Self {
        Self {
            data: SessionData::new(session_id),
        }
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Transition: Disconnected → LogonPending
    pub fn logon(mut self) -> SessionLogonPending {
        self.data.logon_attempts += 1;
        SessionLogonPending { data: self.data }
    }
}

// ============================================================================
// State: LogonPending
// ============================================================================

/// **Valid Transitions:**
/// - `acknowledged()` → SessionActive
/// - `transport_failed()` → SessionDisconnected + SessionDrop
#[derive(Debug, Clone)]
pub struct SessionLogonPending {
    data: SessionData,
}

impl SessionLogonPending {
    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Transition: LogonPending → Active
    pub fn acknowledged(mut self) -> SessionActive {
        self.data.last_active_at = Some(SystemTime::now());
        self.data.logon_count += 1;
        SessionActive { data: self.data }
    }

    /// Transition: LogonPending → Disconnected
    pub fn transport_failed(self) -> (SessionDisconnected, SessionDrop) {
        drop_to_disconnected(self.data, SessionPhase::LogonPending)
    }
}

// ============================================================================
// State: Active
// ============================================================================

/// **Valid Transitions:**
/// - `logout(initiator)` → SessionLogoutPending
/// - `transport_failed()` → SessionDisconnected + SessionDrop
#[derive(Debug, Clone)]
pub struct SessionActive {
    data: SessionData,
}

impl SessionActive {
    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Transition: Active → LogoutPending
    pub fn logout(self, initiator: LogoutInitiator) -> SessionLogoutPending {
        SessionLogoutPending {
            data: self.data,
            initiator,
        }
    }

    /// Transition: Active → Disconnected
    pub fn transport_failed(self) -> (SessionDisconnected, SessionDrop) {
        drop_to_disconnected(self.data, SessionPhase::Active)
    }
}

// ============================================================================
// State: LogoutPending
// ============================================================================

/// **Valid Transitions:**
/// - `complete()` → SessionDisconnected
/// - `transport_failed()` → SessionDisconnected (no drop signal, the
///   session was ending anyway)
#[derive(Debug, Clone)]
pub struct SessionLogoutPending {
    data: SessionData,
    initiator: LogoutInitiator,
}

impl SessionLogoutPending {
    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn initiator(&self) -> LogoutInitiator {
        self.initiator
    }

    /// Transition: LogoutPending → Disconnected
    pub fn complete(mut self) -> SessionDisconnected {
        self.data.logout_count += 1;
        self.data.last_disconnected_at = Some(SystemTime::now());
        SessionDisconnected { data: self.data }
    }

    /// Transition: LogoutPending → Disconnected
    pub fn transport_failed(self) -> SessionDisconnected {
        self.complete()
    }
}

fn drop_to_disconnected(mut data: SessionData, from: SessionPhase) -> (SessionDisconnected, SessionDrop) {
    data.drop_count += 1;
    data.last_disconnected_at = Some(SystemTime::now());
    let signal = SessionDrop {
        session_id: data.session_id,
        from,
    };
    (SessionDisconnected { data }, signal)
}

// ============================================================================
// Runtime wrapper
// ============================================================================

/// Copyable phase tag, mirrored atomically by the session gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionPhase {
    Disconnected = 0,
    LogonPending = 1,
    Active = 2,
    LogoutPending = 3,
}

impl SessionPhase {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionPhase::LogonPending,
            2 => SessionPhase::Active,
            3 => SessionPhase::LogoutPending,
            _ => SessionPhase::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Disconnected => "Disconnected",
            SessionPhase::LogonPending => "LogonPending",
            SessionPhase::Active => "Active",
            SessionPhase::LogoutPending => "LogoutPending",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs accepted by [`SessionState::on_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LogonAttempt,
    LogonAck,
    LogoutRequest(LogoutInitiator),
    LogoutComplete,
    TransportFailure,
}

impl SessionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEvent::LogonAttempt => "LogonAttempt",
            SessionEvent::LogonAck => "LogonAck",
            SessionEvent::LogoutRequest(_) => "LogoutRequest",
            SessionEvent::LogoutComplete => "LogoutComplete",
            SessionEvent::TransportFailure => "TransportFailure",
        }
    }
}

/// Type-erased session state
#[derive(Debug, Clone)]
pub enum SessionState {
    Disconnected(SessionDisconnected),
    LogonPending(SessionLogonPending),
    Active(SessionActive),
    LogoutPending(SessionLogoutPending),
}

impl SessionState {
    pub fn new(session_id: u16) -> Self {
        SessionState::Disconnected(SessionDisconnected::new(session_id))
    }

    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Disconnected(_) => SessionPhase::Disconnected,
            SessionState::LogonPending(_) => SessionPhase::LogonPending,
            SessionState::Active(_) => SessionPhase::Active,
            SessionState::LogoutPending(_) => SessionPhase::LogoutPending,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    pub fn state_name(&self) -> &'static str {
        self.phase().as_str()
    }

    pub fn data(&self) -> &SessionData {
        match self {
            SessionState::Disconnected(s) => s.data(),
            SessionState::LogonPending(s) => s.data(),
            SessionState::Active(s) => s.data(),
            SessionState::LogoutPending(s) => s.data(),
        }
    }

    /// Apply an event; the state is left unchanged on an invalid transition
    ///
    /// Returns the drop signal when a live session lost its transport.
    pub fn on_event(&mut self, event: SessionEvent) -> Result<Option<SessionDrop>, SessionError> {
        let placeholder = SessionState::new(self.data().session_id);
        let current = std::mem::replace(self, placeholder);

        let (next, signal) = match (current, event) {
            (SessionState::Disconnected(s), SessionEvent::LogonAttempt) => (s.logon().into(), None),
            (SessionState::LogonPending(s), SessionEvent::LogonAck) => (s.acknowledged().into(), None),
            (SessionState::LogonPending(s), SessionEvent::TransportFailure) => {
                let (next, signal) = s.transport_failed();
                (next.into(), Some(signal))
            }
            (SessionState::Active(s), SessionEvent::LogoutRequest(initiator)) => {
                (s.logout(initiator).into(), None)
            }
            (SessionState::Active(s), SessionEvent::TransportFailure) => {
                let (next, signal) = s.transport_failed();
                (next.into(), Some(signal))
            }
            (SessionState::LogoutPending(s), SessionEvent::LogoutComplete) => (s.complete().into(), None),
            (SessionState::LogoutPending(s), SessionEvent::TransportFailure) => {
                (s.transport_failed().into(), None)
            }
            (current, event) => {
                let err = SessionError::InvalidTransition {
                    state: current.state_name(),
                    event: event.as_str(),
                };
                *self = current;
                return Err(err);
            }
        };

        *self = next;
        Ok(signal)
    }
}

impl From<SessionDisconnected> for SessionState {
    fn from(s: SessionDisconnected) -> Self {
        SessionState::Disconnected(s)
    }
}

impl From<SessionLogonPending> for SessionState {
    fn from(s: SessionLogonPending) -> Self {
        SessionState::LogonPending(s)
    }
}

impl From<SessionActive> for SessionState {
    fn from(s: SessionActive) -> Self {
        SessionState::Active(s)
    }
}

impl From<SessionLogoutPending> for SessionState {
    fn from(s: SessionLogoutPending) -> Self {
        SessionState::LogoutPending(s)
    }
}
