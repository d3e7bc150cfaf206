//! Lock-free per-stage counters
//!
//! Each stage runner owns one `StageCounters` and is its only writer; the
//! pipeline snapshots them from other threads. Relaxed ordering throughout.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache-aligned counters for one stage
///
/// Each counter sits on its own cache line so that the stage thread and a
/// reader taking snapshots never false-share.
#[repr(C, align(64))]
pub struct StageCounters {
    /// Slots handed to `process_one` (including retries of parked slots once)
    pub processed: AtomicU64,
    _padding1: [u8; 56],

    pub forwarded: AtomicU64,
    _padding2: [u8; 56],

    /// Slots this stage stamped as rejected
    pub rejected: AtomicU64,
    _padding3: [u8; 56],

    /// Park outcomes (each retry counts once)
    pub parked: AtomicU64,
    _padding4: [u8; 56],

    /// Slots passed over because an upstream stage rejected them
    pub skipped: AtomicU64,
    _padding5: [u8; 56],

    /// Panics caught inside `process_one`
    pub faults: AtomicU64,
    _padding6: [u8; 56],

    /// Cumulative processing latency in nanoseconds
    pub total_latency_ns: AtomicU64,
    _padding7: [u8; 56],
}

impl StageCounters {
    pub const fn new() -> Self {
        Self {
            processed: AtomicU64::new(0),
            _padding1: [0; 56],
            forwarded: AtomicU64::new(0),
            _padding2: [0; 56],
            rejected: AtomicU64::new(0),
            _padding3: [0; 56],
            parked: AtomicU64::new(0),
            _padding4: [0; 56],
            skipped: AtomicU64::new(0),
            _padding5: [0; 56],
            faults: AtomicU64::new(0),
            _padding6: [0; 56],
            total_latency_ns: AtomicU64::new(0),
            _padding7: [0; 56],
        }
    }

    #[inline(always)]
    pub fn inc_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_parked(&self) {
        self.parked.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_faults(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn add_latency(&self, latency_ns: u64) {
        self.total_latency_ns
            .fetch_add(latency_ns, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StageCountersSnapshot {
        StageCountersSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            parked: self.parked.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            total_latency_ns: self.total_latency_ns.load(Ordering::Relaxed),
        }
    }
}

impl Default for StageCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCountersSnapshot {
    pub processed: u64,
    pub forwarded: u64,
    pub rejected: u64,
    pub parked: u64,
    pub skipped: u64,
    pub faults: u64,
    pub total_latency_ns: u64,
}

impl StageCountersSnapshot {
    /// Average processing latency per processed slot
    pub fn avg_latency_ns(&self) -> f64 {
        if self.processed > 0 {
            self.total_latency_ns as f64 / self.processed as f64
        } else {
            0.0
        }
    }

    /// Fraction of processed slots this stage rejected
    pub fn reject_rate(&self) -> f64 {
        if self.processed > 0 {
            self.rejected as f64 / self.processed as f64
        } else {
            0.0
        }
    }
}
