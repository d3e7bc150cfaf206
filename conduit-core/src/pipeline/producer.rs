//! Producer side of the pipeline
//!
//! A [`ProducerHandle`] is the only way events enter the ring. It checks,
//! in order: the pipeline is still accepting, the bound session (if any) is
//! Active, and the ring has room under the configured backpressure policy.
//!
//! Admission is shared with the pipeline: a publish registers itself as in
//! flight before reading the accepting flag, and drain closes the flag
//! before waiting for the in-flight count to reach zero. Either the
//! publish sees the flag closed or drain sees the publish, never neither.

use crate::core::{clock, EventSlot, PublishError, RingError, TradingEvent};
use crate::gateway::SessionGate;
use crate::metrics::{names, MetricsSink};
use crate::ring::RingBuffer;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Accepting flag plus the count of publishes that passed it
#[derive(Debug)]
pub(crate) struct Admission {
    accepting: AtomicBool,
    in_flight: AtomicUsize,
}

impl Admission {
    pub(crate) fn new() -> Self {
        Self {
            accepting: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Register a publish; `None` once closed
    pub(crate) fn enter(&self) -> Option<AdmissionGuard<'_>> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = AdmissionGuard { admission: self };
        if self.accepting.load(Ordering::SeqCst) {
            Some(guard)
        } else {
            None
        }
    }

    pub(crate) fn close(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_open(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Publishes admitted but not yet returned
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

pub(crate) struct AdmissionGuard<'a> {
    admission: &'a Admission,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.admission.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ProducerHandle {
    ring: Arc<RingBuffer<EventSlot>>,
    admission: Arc<Admission>,
    gate: Option<SessionGate>,
    producer_id: u16,
    metrics: Arc<dyn MetricsSink>,
    published: u64,
}

impl ProducerHandle {
    pub(crate) fn new(
        ring: Arc<RingBuffer<EventSlot>>,
        admission: Arc<Admission>,
        gate: Option<SessionGate>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let producer_id = gate.as_ref().map(|g| g.session_id()).unwrap_or(0);
        Self {
            ring,
            admission,
            gate,
            producer_id,
            metrics,
            published: 0,
        }
    }

    /// Session id stamped on every slot this handle publishes
    pub fn producer_id(&self) -> u16 {
        self.producer_id
    }

    pub fn gate(&self) -> Option<&SessionGate> {
        self.gate.as_ref()
    }

    /// Events published through this handle
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Whether a publish would currently pass the accepting and session checks
    pub fn is_open(&self) -> bool {
        self.admission.is_open()
            && self.gate.as_ref().map_or(true, SessionGate::is_active)
    }

    /// Publish one event and return its sequence number
    ///
    /// Under the `Block` policy this suspends while the ring is full.
    pub fn publish(&mut self, event: TradingEvent) -> Result<u64, PublishError> {
        let Some(_admitted) = self.admission.enter() else {
            return Err(PublishError::NotAccepting);
        };

        if let Some(gate) = &self.gate {
            if !gate.is_active() {
                self.metrics.record(names::SESSION_PAUSED_REJECTS, 1);
                return Err(PublishError::SessionPaused {
                    session: gate.session_id(),
                });
            }
        }

        let producer_id = self.producer_id;
        let claimed_at = clock::monotonic_ns();
        match self
            .ring
            .publish(|sequence, slot| slot.fill(sequence, event, producer_id, claimed_at))
        {
            Ok(sequence) => {
                self.published += 1;
                self.metrics.record(names::EVENTS_PUBLISHED, 1);
                self.metrics.record_latency(
                    names::INGEST,
                    clock::monotonic_ns().saturating_sub(claimed_at),
                );
                Ok(sequence)
            }
            Err(e @ RingError::Backpressure { .. }) => {
                debug!(producer = producer_id, "Publish rejected: {}", e);
                self.metrics.record(names::BACKPRESSURE_REJECTS, 1);
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for ProducerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("producer_id", &self.producer_id)
            .field("published", &self.published)
            .finish_non_exhaustive()
    }
}
