//! Inbound path: wire bytes to published events
//!
//! Decode failures stop here. They never reach the ring; each one is
//! written straight to the audit sink as a sequence-less record and
//! counted.

use super::ProducerHandle;
use crate::audit::{AuditRecord, AuditSink};
use crate::core::{clock, PublishError};
use crate::gateway::SessionGateway;
use crate::metrics::{names, MetricsSink};
use std::sync::Arc;
use tracing::warn;

pub struct SessionIngress {
    gateway: Arc<dyn SessionGateway>,
    producer: ProducerHandle,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<dyn MetricsSink>,
}

impl SessionIngress {
    pub fn new(
        gateway: Arc<dyn SessionGateway>,
        producer: ProducerHandle,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            gateway,
            producer,
            audit,
            metrics,
        }
    }

    pub fn producer(&self) -> &ProducerHandle {
        &self.producer
    }

    /// Decode and publish one inbound message
    ///
    /// Returns the assigned sequence, or `None` when nothing was published
    /// (session-level message or decode failure).
    pub fn on_bytes(&mut self, raw: &[u8]) -> Result<Option<u64>, PublishError> {
        match self.gateway.on_inbound_message(raw) {
            Ok(Some(event)) => self.producer.publish(event).map(Some),
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(
                    producer = self.producer.producer_id(),
                    "Dropping undecodable message: {}", e
                );
                self.metrics.record(names::DECODE_ERRORS, 1);
                if let Err(audit_err) = self
                    .audit
                    .record(AuditRecord::decode_failure(&e, clock::wall_clock_ns()))
                {
                    warn!("Failed to audit decode error: {}", audit_err);
                    self.metrics.record(names::AUDIT_FAILURES, 1);
                }
                Ok(None)
            }
        }
    }
}
