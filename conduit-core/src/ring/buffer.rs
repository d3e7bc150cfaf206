//! Pre-allocated ring of reusable slots
//!
//! All slots are allocated once, at construction. Publishing never
//! allocates: a producer claims a sequence, writes into the slot in place,
//! and commits. Slot index is `sequence & (capacity - 1)`.
//!
//! # Ownership of a slot
//!
//! ```text
//!   claimed ──▶ producer owns the slot (ClaimGuard)
//!   committed ──▶ stage k owns it while stage k-1 has passed it
//!                 and stage k has not
//!   released ──▶ every gating sequence has passed it; next lap may claim
//! ```
//!
//! The sequencer enforces those hand-offs, which is what makes the
//! `UnsafeCell` access sound.

use super::barrier::SequenceBarrier;
use super::sequence::Sequence;
use super::sequencer::{BackpressurePolicy, ProducerMode, Sequencer};
use super::wait::WaitStrategy;
use crate::core::{PipelineError, RingError};
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Smallest ring the pipeline accepts
pub const MIN_CAPACITY: usize = 2;

pub struct RingBuffer<T> {
    slots: Box<[UnsafeCell<T>]>,
    sequencer: Sequencer,
}

// SAFETY: slot access is serialized by the sequencer. A slot is written
// only by the producer that claimed it (or by the single stage currently
// owning it), and read only after the owning sequence has been published
// with release ordering.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T: Default> RingBuffer<T> {
    /// Allocate `capacity` default slots
    ///
    /// Fails unless `capacity` is a power of two >= [`MIN_CAPACITY`].
    pub fn new(
        capacity: usize,
        mode: ProducerMode,
        policy: BackpressurePolicy,
        wait: Arc<dyn WaitStrategy>,
    ) -> Result<Self, PipelineError> {
        if capacity < MIN_CAPACITY || !capacity.is_power_of_two() {
            return Err(PipelineError::Config(format!(
                "ring capacity must be a power of two >= {}, got {}",
                MIN_CAPACITY, capacity
            )));
        }

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(T::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            slots,
            sequencer: Sequencer::new(capacity, mode, policy, wait),
        })
    }
}

impl<T> RingBuffer<T> {
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.sequencer.capacity()
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Highest published sequence (0 before the first publish)
    #[inline(always)]
    pub fn cursor(&self) -> u64 {
        self.sequencer.highest_published()
    }

    pub fn cursor_sequence(&self) -> Arc<Sequence> {
        self.sequencer.cursor().clone()
    }

    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.sequencer.add_gating_sequences(sequences);
    }

    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.sequencer.remove_gating_sequence(sequence)
    }

    pub fn remaining_capacity(&self) -> usize {
        self.sequencer.remaining_capacity()
    }

    /// Barrier gated on `dependents`, or directly on the cursor when empty
    pub fn new_barrier(&self, dependents: Vec<Arc<Sequence>>) -> SequenceBarrier {
        SequenceBarrier::new(
            self.sequencer.cursor().clone(),
            dependents,
            self.sequencer.wait_strategy().clone(),
            self.sequencer.alert().clone(),
        )
    }

    /// Claim the next slot
    ///
    /// The returned guard derefs to the slot; it commits when
    /// [`ClaimGuard::commit`] is called or when it is dropped.
    pub fn claim_next(&self) -> Result<ClaimGuard<'_, T>, RingError> {
        let sequence = self.sequencer.claim()?;
        Ok(ClaimGuard {
            ring: self,
            sequence,
            committed: false,
        })
    }

    /// Claim, fill in place with `fill(sequence, slot)`, and commit
    pub fn publish<F>(&self, fill: F) -> Result<u64, RingError>
    where
        F: FnOnce(u64, &mut T),
    {
        let mut guard = self.claim_next()?;
        let sequence = guard.sequence();
        fill(sequence, &mut guard);
        guard.commit();
        Ok(sequence)
    }

    /// Shared view of the slot for `sequence`
    ///
    /// # Safety
    ///
    /// `sequence` must be published and not yet released to the next lap,
    /// and no other thread may hold a mutable reference to the slot.
    #[inline(always)]
    pub unsafe fn get(&self, sequence: u64) -> &T {
        &*self.slots[self.sequencer.index(sequence)].get()
    }

    /// Exclusive view of the slot for `sequence`
    ///
    /// # Safety
    ///
    /// Caller must be the sole owner of `sequence` at this point in the
    /// pipeline (the claiming producer, or the stage whose barrier covers
    /// the sequence and whose own sequence has not passed it).
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, sequence: u64) -> &mut T {
        &mut *self.slots[self.sequencer.index(sequence)].get()
    }

    /// Stop producers and alert every barrier
    pub fn halt(&self) {
        self.sequencer.halt();
    }

    pub fn is_halted(&self) -> bool {
        self.sequencer.is_halted()
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}

/// Exclusive claim on one slot; commits on drop
pub struct ClaimGuard<'a, T> {
    ring: &'a RingBuffer<T>,
    sequence: u64,
    committed: bool,
}

impl<T> ClaimGuard<'_, T> {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Make the slot visible to consumers
    pub fn commit(mut self) {
        self.do_commit();
    }

    fn do_commit(&mut self) {
        if !self.committed {
            self.committed = true;
            self.ring.sequencer.commit(self.sequence);
        }
    }
}

impl<T> Deref for ClaimGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the claimed sequence is owned by this guard until commit
        unsafe { self.ring.get(self.sequence) }
    }
}

impl<T> DerefMut for ClaimGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above; no consumer can reach an uncommitted sequence
        unsafe { self.ring.get_mut(self.sequence) }
    }
}

impl<T> Drop for ClaimGuard<'_, T> {
    fn drop(&mut self) {
        self.do_commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::wait::{BusySpinWait, WaitStrategyKind};

    fn ring(capacity: usize, policy: BackpressurePolicy) -> RingBuffer<u64> {
        RingBuffer::new(
            capacity,
            ProducerMode::Single,
            policy,
            Arc::new(BusySpinWait),
        )
        .unwrap()
    }

    #[test]
    fn test_capacity_must_be_power_of_two() {
        for bad in [0, 1, 3, 12, 1000] {
            let result = RingBuffer::<u64>::new(
                bad,
                ProducerMode::Single,
                BackpressurePolicy::Block,
                WaitStrategyKind::BusySpin.build(),
            );
            assert!(result.is_err(), "capacity {} must be rejected", bad);
        }
        assert_eq!(ring(1024, BackpressurePolicy::Block).capacity(), 1024);
    }

    #[test]
    fn test_publish_writes_in_place() {
        let ring = ring(8, BackpressurePolicy::Reject);
        let seq = ring.publish(|seq, slot| *slot = seq * 10).unwrap();
        assert_eq!(seq, 1);
        assert_eq!(ring.cursor(), 1);
        assert_eq!(unsafe { *ring.get(1) }, 10);
    }

    #[test]
    fn test_guard_commits_on_drop() {
        let ring = ring(8, BackpressurePolicy::Reject);
        {
            let mut guard = ring.claim_next().unwrap();
            *guard = 7;
            assert_eq!(ring.cursor(), 0);
        }
        assert_eq!(ring.cursor(), 1);
        assert_eq!(unsafe { *ring.get(1) }, 7);
    }

    #[test]
    fn test_slots_are_reused_each_lap() {
        let ring = ring(4, BackpressurePolicy::Reject);
        let consumer = Sequence::shared();
        ring.add_gating_sequences(&[consumer.clone()]);

        for lap in 0..3u64 {
            for i in 1..=4u64 {
                let seq = ring.publish(|seq, slot| *slot = seq).unwrap();
                assert_eq!(seq, lap * 4 + i);
            }
            consumer.set(ring.cursor());
        }
        // Sequence 12 lives in index 0 after three laps
        assert_eq!(unsafe { *ring.get(12) }, 12);
        assert_eq!(unsafe { *ring.get(8) }, 12);
    }

    #[test]
    fn test_ninth_publish_rejected_without_consumer_progress() {
        let ring = ring(8, BackpressurePolicy::Reject);
        ring.add_gating_sequences(&[Sequence::shared()]);

        for _ in 0..8 {
            ring.publish(|seq, slot| *slot = seq).unwrap();
        }
        let err = ring.publish(|seq, slot| *slot = seq).unwrap_err();
        assert!(matches!(err, RingError::Backpressure { sequence: 9, .. }));
        // Slot 1 was not overwritten
        assert_eq!(unsafe { *ring.get(1) }, 1);
    }

    #[test]
    fn test_barrier_sees_published() {
        let ring = ring(8, BackpressurePolicy::Reject);
        let barrier = ring.new_barrier(Vec::new());
        ring.publish(|_, slot| *slot = 1).unwrap();
        ring.publish(|_, slot| *slot = 2).unwrap();
        assert_eq!(barrier.wait_for(1).unwrap(), 2);
    }
}
