//! Sequence claiming and publication
//!
//! ```text
//!   producers ──claim──▶ [claimed]          (next free sequence)
//!                │
//!                ▼ write slot
//!   producers ──commit─▶ [available[idx]]   (per-slot lap marker)
//!                │
//!                ▼ advance over contiguous commits
//!               [cursor] ──▶ barriers       (highest published)
//! ```
//!
//! The cursor only moves over an unbroken run of committed sequences, so a
//! consumer never observes sequence N+1 before N even when two producers
//! commit out of order. Claims are gated on the slowest registered consumer:
//! sequence `n` may only be claimed once every gating sequence has reached
//! `n - capacity`.

use super::sequence::{min_sequence, Sequence, INITIAL_SEQUENCE};
use super::wait::WaitStrategy;
use crate::core::RingError;
use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// How many threads may claim sequences concurrently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProducerMode {
    /// Exactly one publishing thread; claims are a plain store
    #[default]
    Single,
    /// Any number of publishing threads; claims use compare-and-swap
    Multi,
}

/// What a producer does when the ring is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Wait until the slowest consumer frees a slot (or the ring halts)
    #[default]
    Block,
    /// Fail the publish immediately with [`RingError::Backpressure`]
    Reject,
}

pub struct Sequencer {
    capacity: u64,
    mask: u64,
    mode: ProducerMode,
    policy: BackpressurePolicy,
    /// Highest claimed sequence
    claimed: CachePadded<AtomicU64>,
    /// Highest contiguously committed sequence
    cursor: Arc<Sequence>,
    /// Last observed minimum of the gating sequences
    gating_cache: CachePadded<AtomicU64>,
    gating: RwLock<Vec<Arc<Sequence>>>,
    /// `available[seq & mask] == seq` once `seq` is committed
    available: Box<[AtomicU64]>,
    wait: Arc<dyn WaitStrategy>,
    alert: Arc<AtomicBool>,
}

impl Sequencer {
    /// `capacity` must already be validated as a power of two
    pub(crate) fn new(
        capacity: usize,
        mode: ProducerMode,
        policy: BackpressurePolicy,
        wait: Arc<dyn WaitStrategy>,
    ) -> Self {
        let available = (0..capacity)
            .map(|_| AtomicU64::new(INITIAL_SEQUENCE))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            capacity: capacity as u64,
            mask: capacity as u64 - 1,
            mode,
            policy,
            claimed: CachePadded::new(AtomicU64::new(INITIAL_SEQUENCE)),
            cursor: Sequence::shared(),
            gating_cache: CachePadded::new(AtomicU64::new(INITIAL_SEQUENCE)),
            gating: RwLock::new(Vec::new()),
            available,
            wait,
            alert: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    #[inline(always)]
    pub(crate) fn index(&self, sequence: u64) -> usize {
        (sequence & self.mask) as usize
    }

    pub fn mode(&self) -> ProducerMode {
        self.mode
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    pub(crate) fn cursor(&self) -> &Arc<Sequence> {
        &self.cursor
    }

    pub(crate) fn wait_strategy(&self) -> &Arc<dyn WaitStrategy> {
        &self.wait
    }

    pub(crate) fn alert(&self) -> &Arc<AtomicBool> {
        &self.alert
    }

    /// Highest sequence visible to consumers
    #[inline(always)]
    pub fn highest_published(&self) -> u64 {
        self.cursor.get()
    }

    /// Highest sequence handed to a producer (may be uncommitted)
    pub fn highest_claimed(&self) -> u64 {
        self.claimed.load(Ordering::Acquire)
    }

    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        let mut gating = self.gating.write();
        for seq in sequences {
            // A consumer added late starts at the current cursor
            seq.set(seq.get().max(self.cursor.get()));
            gating.push(seq.clone());
        }
    }

    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        let mut gating = self.gating.write();
        let before = gating.len();
        gating.retain(|s| !Arc::ptr_eq(s, sequence));
        gating.len() != before
    }

    /// Minimum over the gating sequences (or the claimed value if none)
    pub fn minimum_gating_sequence(&self) -> u64 {
        let gating = self.gating.read();
        min_sequence(&gating, self.claimed.load(Ordering::Acquire))
    }

    /// Free slots from the producer's point of view
    pub fn remaining_capacity(&self) -> usize {
        let consumed = self.minimum_gating_sequence();
        let claimed = self.claimed.load(Ordering::Acquire);
        (self.capacity - claimed.saturating_sub(consumed).min(self.capacity)) as usize
    }

    pub fn halt(&self) {
        self.alert.store(true, Ordering::Release);
        self.wait.signal_all_when_blocking();
    }

    pub fn is_halted(&self) -> bool {
        self.alert.load(Ordering::Acquire)
    }

    /// Claim the next sequence, honoring the backpressure policy
    pub fn claim(&self) -> Result<u64, RingError> {
        let backoff = Backoff::new();
        loop {
            if self.is_halted() {
                return Err(RingError::Halted);
            }

            let current = self.claimed.load(Ordering::Acquire);
            let next = current + 1;
            let wrap_point = next.saturating_sub(self.capacity);

            if wrap_point > self.gating_cache.load(Ordering::Acquire) {
                let min_gating = self.minimum_gating_sequence_from(current);
                self.gating_cache.store(min_gating, Ordering::Release);

                if wrap_point > min_gating {
                    match self.policy {
                        BackpressurePolicy::Reject => {
                            return Err(RingError::Backpressure {
                                sequence: next,
                                capacity: self.capacity as usize,
                            });
                        }
                        BackpressurePolicy::Block => {
                            if backoff.is_completed() {
                                std::thread::yield_now();
                            } else {
                                backoff.snooze();
                            }
                            continue;
                        }
                    }
                }
            }

            match self.mode {
                ProducerMode::Single => {
                    self.claimed.store(next, Ordering::Release);
                    return Ok(next);
                }
                ProducerMode::Multi => {
                    if self
                        .claimed
                        .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return Ok(next);
                    }
                }
            }
        }
    }

    fn minimum_gating_sequence_from(&self, claimed: u64) -> u64 {
        let gating = self.gating.read();
        min_sequence(&gating, claimed)
    }

    /// Mark `sequence` committed and advance the cursor over every
    /// contiguous committed sequence
    pub fn commit(&self, sequence: u64) {
        let idx = self.index(sequence);
        self.available[idx].store(sequence, Ordering::SeqCst);

        loop {
            let current = self.cursor.get_seq_cst();
            let next = current + 1;
            if self.available[self.index(next)].load(Ordering::SeqCst) != next {
                break;
            }
            // Losing the race means another committer advanced it; re-read
            let _ = self.cursor.compare_and_set(current, next);
        }

        self.wait.signal_all_when_blocking();
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("capacity", &self.capacity)
            .field("mode", &self.mode)
            .field("policy", &self.policy)
            .field("claimed", &self.highest_claimed())
            .field("cursor", &self.highest_published())
            .field("halted", &self.is_halted())
            .finish()
    }
}
