//! Wait strategies for consumers blocked on a sequence barrier
//!
//! | strategy   | latency | CPU       | mechanism                                |
//! |------------|---------|-----------|------------------------------------------|
//! | BusySpin   | lowest  | 100% core | `spin_loop` hint                         |
//! | Yielding   | low     | high      | exponential spin, then `yield_now`       |
//! | Blocking   | higher  | idle      | mutex + condvar woken by every publish   |
//!
//! Every strategy observes the alert flag on each iteration so that a
//! parked stage exits promptly on shutdown.

use super::sequence::{min_sequence, Sequence};
use crate::core::BarrierError;
use crossbeam_utils::Backoff;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on a single condvar wait, so a missed wake-up only delays
/// a blocked consumer instead of stranding it
const BLOCKING_RECHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Suspension policy used while a consumer waits for `sequence`
pub trait WaitStrategy: Send + Sync + fmt::Debug {
    /// Wait until the gating value reaches `sequence`
    ///
    /// The gating value is `min(dependents)`, or `cursor` when there are no
    /// upstream stages. Returns the gating value observed (>= `sequence`).
    fn wait_for(
        &self,
        sequence: u64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<u64, BarrierError>;

    /// Wake consumers parked in `wait_for` (called after every publish)
    fn signal_all_when_blocking(&self);
}

/// Configurable wait strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategyKind {
    BusySpin,
    Yielding,
    #[default]
    Blocking,
}

impl WaitStrategyKind {
    pub fn build(&self) -> Arc<dyn WaitStrategy> {
        match self {
            WaitStrategyKind::BusySpin => Arc::new(BusySpinWait),
            WaitStrategyKind::Yielding => Arc::new(YieldingWait),
            WaitStrategyKind::Blocking => Arc::new(BlockingWait::new()),
        }
    }
}

#[inline(always)]
fn gating_value(cursor: &Sequence, dependents: &[Arc<Sequence>]) -> u64 {
    if dependents.is_empty() {
        cursor.get()
    } else {
        min_sequence(dependents, cursor.get())
    }
}

#[inline(always)]
fn check_alert(alert: &AtomicBool) -> Result<(), BarrierError> {
    if alert.load(Ordering::Acquire) {
        Err(BarrierError::Alerted)
    } else {
        Ok(())
    }
}

/// Busy-spin: minimum latency, burns a full core
#[derive(Debug, Default)]
pub struct BusySpinWait;

impl WaitStrategy for BusySpinWait {
    fn wait_for(
        &self,
        sequence: u64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<u64, BarrierError> {
        loop {
            check_alert(alert)?;
            let available = gating_value(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            std::hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Spin with exponential backoff, then yield the time slice
#[derive(Debug, Default)]
pub struct YieldingWait;

impl WaitStrategy for YieldingWait {
    fn wait_for(
        &self,
        sequence: u64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<u64, BarrierError> {
        let backoff = Backoff::new();
        loop {
            check_alert(alert)?;
            let available = gating_value(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            if backoff.is_completed() {
                std::thread::yield_now();
            } else {
                backoff.snooze();
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Park on a condition variable until the producer cursor moves
///
/// Upstream stages do not signal, so once the cursor is past `sequence`
/// the strategy spins/yields on the dependent sequences.
#[derive(Debug, Default)]
pub struct BlockingWait {
    lock: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWait {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for BlockingWait {
    fn wait_for(
        &self,
        sequence: u64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alert: &AtomicBool,
    ) -> Result<u64, BarrierError> {
        if cursor.get() < sequence {
            let mut guard = self.lock.lock();
            while cursor.get() < sequence {
                check_alert(alert)?;
                self.condvar.wait_for(&mut guard, BLOCKING_RECHECK_INTERVAL);
            }
        }

        let backoff = Backoff::new();
        loop {
            check_alert(alert)?;
            let available = gating_value(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            if backoff.is_completed() {
                std::thread::yield_now();
            } else {
                backoff.snooze();
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }
}
