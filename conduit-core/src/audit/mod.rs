//! Audit storage boundary
//!
//! The Audit stage hands every terminal outcome to an [`AuditSink`] as an
//! opaque structured [`AuditRecord`]. Sinks must not block: a sink that
//! cannot keep up returns an error, which the caller logs and counts.
//!
//! - [`MemoryAuditSink`]: in-process Vec, for tests and the demo
//! - [`JournalAuditSink`]: background writer appending JSON lines

pub mod journal;

pub use journal::{read_journal, JournalAuditSink};

use crate::core::{
    CorrelationId, Disposition, EventKind, EventSlot, RejectCode,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Terminal outcome of one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Accepted,
    Rejected,
}

/// One audit entry
///
/// Decode failures never receive a sequence number, so `sequence` and
/// `event_type` are absent for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub sequence: Option<u64>,
    pub event_type: Option<EventKind>,
    pub correlation_id: CorrelationId,
    pub outcome: AuditOutcome,
    pub reason_code: Option<RejectCode>,
    pub reason: Option<String>,
    /// Stage that rejected the event
    pub rejected_by: Option<String>,
    /// Wall-clock time the record was produced
    pub timestamp_ns: u64,
    /// Monotonic time from ingest to audit
    pub latency_ns: u64,
}

impl AuditRecord {
    /// Record the terminal state of a slot; `None` for an empty slot
    pub fn from_slot(slot: &EventSlot, timestamp_ns: u64, latency_ns: u64) -> Option<Self> {
        let event = slot.event()?;
        let (outcome, reason_code, reason, rejected_by) = match slot.disposition() {
            Disposition::Pending => (AuditOutcome::Accepted, None, None, None),
            Disposition::Rejected { stage, reason } => (
                AuditOutcome::Rejected,
                Some(reason.code()),
                Some(reason.to_string()),
                Some(stage.to_string()),
            ),
        };

        Some(Self {
            sequence: Some(event.sequence),
            event_type: Some(event.kind()),
            correlation_id: event.correlation_id,
            outcome,
            reason_code,
            reason,
            rejected_by,
            timestamp_ns,
            latency_ns,
        })
    }

    /// Record for inbound bytes that never became an event
    pub fn decode_failure(reason: impl std::fmt::Display, timestamp_ns: u64) -> Self {
        Self {
            sequence: None,
            event_type: None,
            correlation_id: CorrelationId::NONE,
            outcome: AuditOutcome::Rejected,
            reason_code: Some(RejectCode::DecodeError),
            reason: Some(reason.to_string()),
            rejected_by: Some("gateway".to_string()),
            timestamp_ns,
            latency_ns: 0,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.outcome == AuditOutcome::Rejected
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    /// The sink's buffer is full; the record was dropped
    #[error("audit buffer full; record dropped")]
    Full,

    #[error("audit sink closed")]
    Closed,

    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Consumed audit-storage collaborator
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord) -> Result<(), AuditError>;
}

impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        (**self).record(record)
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn find_by_sequence(&self, sequence: u64) -> Option<AuditRecord> {
        self.records
            .lock()
            .iter()
            .find(|r| r.sequence == Some(sequence))
            .cloned()
    }

    pub fn rejected(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.is_rejected())
            .cloned()
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records.lock().push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        EventPayload, MarketDataTick, RejectReason, Symbol, TradingEvent, ValidationFailure,
    };

    fn tick_slot(sequence: u64) -> EventSlot {
        let mut slot = EventSlot::default();
        let event = TradingEvent::new(
            CorrelationId(9),
            0,
            EventPayload::MarketDataTick(MarketDataTick {
                symbol: Symbol::new("X").unwrap(),
                bid_price: 1,
                bid_quantity: 1,
                ask_price: 2,
                ask_quantity: 1,
            }),
        );
        slot.fill(sequence, event, 0, 0);
        slot
    }

    #[test]
    fn test_record_from_accepted_slot() {
        let record = AuditRecord::from_slot(&tick_slot(3), 100, 50).unwrap();
        assert_eq!(record.sequence, Some(3));
        assert_eq!(record.event_type, Some(EventKind::MarketDataTick));
        assert_eq!(record.outcome, AuditOutcome::Accepted);
        assert_eq!(record.reason_code, None);
        assert_eq!(record.latency_ns, 50);
    }

    #[test]
    fn test_record_from_rejected_slot() {
        let mut slot = tick_slot(4);
        slot.reject("validation", ValidationFailure::EmptySymbol.into());
        let record = AuditRecord::from_slot(&slot, 0, 0).unwrap();
        assert!(record.is_rejected());
        assert_eq!(record.reason_code, Some(RejectCode::ValidationReject));
        assert_eq!(record.rejected_by.as_deref(), Some("validation"));
    }

    #[test]
    fn test_empty_slot_has_no_record() {
        assert!(AuditRecord::from_slot(&EventSlot::default(), 0, 0).is_none());
    }

    #[test]
    fn test_decode_failure_record() {
        let record = AuditRecord::decode_failure("missing tag 35", 7);
        assert_eq!(record.sequence, None);
        assert_eq!(record.reason_code, Some(RejectCode::DecodeError));
        assert_eq!(record.reason.as_deref(), Some("missing tag 35"));
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryAuditSink::new();
        assert!(sink.is_empty());
        sink.record(AuditRecord::from_slot(&tick_slot(1), 0, 0).unwrap())
            .unwrap();
        let mut rejected = tick_slot(2);
        rejected.reject("risk", RejectReason::StageFault);
        sink.record(AuditRecord::from_slot(&rejected, 0, 0).unwrap())
            .unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.rejected().len(), 1);
        assert!(sink.find_by_sequence(2).unwrap().is_rejected());
        assert!(sink.find_by_sequence(99).is_none());
    }
}
