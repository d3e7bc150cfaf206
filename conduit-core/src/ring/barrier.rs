//! Consumer-side gate on upstream progress
//!
//! A stage's barrier tracks the sequences of the stages it depends on (or
//! the ring cursor for the first stage). `wait_for(n)` returns the highest
//! sequence the stage may process, which is always >= `n`, so a stage
//! drains whole batches between waits.

use super::sequence::{min_sequence, Sequence};
use super::wait::WaitStrategy;
use crate::core::BarrierError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct SequenceBarrier {
    cursor: Arc<Sequence>,
    dependents: Vec<Arc<Sequence>>,
    wait: Arc<dyn WaitStrategy>,
    alert: Arc<AtomicBool>,
}

impl SequenceBarrier {
    pub(crate) fn new(
        cursor: Arc<Sequence>,
        dependents: Vec<Arc<Sequence>>,
        wait: Arc<dyn WaitStrategy>,
        alert: Arc<AtomicBool>,
    ) -> Self {
        Self {
            cursor,
            dependents,
            wait,
            alert,
        }
    }

    /// Block until `target` is available; returns the highest available
    /// sequence
    ///
    /// Fails with [`BarrierError::Alerted`] once the ring is halted, even
    /// if `target` is already available.
    pub fn wait_for(&self, target: u64) -> Result<u64, BarrierError> {
        if self.is_alerted() {
            return Err(BarrierError::Alerted);
        }
        self.wait
            .wait_for(target, &self.cursor, &self.dependents, &self.alert)
    }

    /// Current gating value without waiting
    pub fn available(&self) -> u64 {
        if self.dependents.is_empty() {
            self.cursor.get()
        } else {
            min_sequence(&self.dependents, self.cursor.get())
        }
    }

    pub fn is_alerted(&self) -> bool {
        self.alert.load(Ordering::Acquire)
    }

    pub fn alert(&self) {
        self.alert.store(true, Ordering::Release);
        self.wait.signal_all_when_blocking();
    }

    pub fn dependents(&self) -> &[Arc<Sequence>] {
        &self.dependents
    }
}

impl std::fmt::Debug for SequenceBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceBarrier")
            .field("cursor", &self.cursor.get())
            .field("available", &self.available())
            .field("dependents", &self.dependents.len())
            .field("alerted", &self.is_alerted())
            .finish()
    }
}
