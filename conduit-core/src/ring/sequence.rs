//! Cache-padded sequence counters
//!
//! Every producer cursor and consumer position lives on its own cache line
//! so that stages advancing their counters never false-share.

use crossbeam_utils::CachePadded;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Value of a sequence before anything has been published or consumed
///
/// The first published sequence is `INITIAL_SEQUENCE + 1`.
pub const INITIAL_SEQUENCE: u64 = 0;

/// Atomic sequence counter on its own cache line
pub struct Sequence {
    value: CachePadded<AtomicU64>,
}

impl Sequence {
    pub fn new(initial: u64) -> Self {
        Self {
            value: CachePadded::new(AtomicU64::new(initial)),
        }
    }

    /// Shared sequence starting at [`INITIAL_SEQUENCE`]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new(INITIAL_SEQUENCE))
    }

    /// Read with acquire ordering (pairs with `set`)
    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Publish a new value with release ordering
    ///
    /// Every write to slots up to `value` made by this thread is visible to
    /// any thread that later observes `value` through `get`.
    #[inline(always)]
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn get_seq_cst(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    #[inline(always)]
    pub(crate) fn compare_and_set(&self, current: u64, new: u64) -> bool {
        self.value
            .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(INITIAL_SEQUENCE)
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sequence").field(&self.get()).finish()
    }
}

/// Minimum over a set of sequences, or `default` when the set is empty
#[inline]
pub fn min_sequence(sequences: &[Arc<Sequence>], default: u64) -> u64 {
    sequences.iter().map(|s| s.get()).min().unwrap_or(default)
}
