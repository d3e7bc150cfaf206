//! Lock-free sequenced ring buffer
//!
//! ```text
//!                 ┌──────────── gating (slowest stage) ◀───────────┐
//!                 ▼                                                 │
//!  Producer ─▶ [Sequencer] ─cursor─▶ Barrier ─▶ Stage 1 ─seq─▶ Barrier ─▶ Stage 2 ...
//!                 │                                                 │
//!                 └────────── slots: Box<[UnsafeCell<T>]> ──────────┘
//! ```
//!
//! - [`Sequence`]: cache-padded `AtomicU64` position
//! - [`Sequencer`]: claim/commit, gating and backpressure
//! - [`RingBuffer`]: pre-allocated slots and [`ClaimGuard`]
//! - [`SequenceBarrier`]: consumer wait on upstream progress
//! - [`WaitStrategy`]: busy-spin, yielding or blocking suspension

pub mod barrier;
pub mod buffer;
pub mod sequence;
pub mod sequencer;
pub mod wait;

#[cfg(test)]
mod ordering_proptest;

pub use barrier::SequenceBarrier;
pub use buffer::{ClaimGuard, RingBuffer, MIN_CAPACITY};
pub use sequence::{min_sequence, Sequence, INITIAL_SEQUENCE};
pub use sequencer::{BackpressurePolicy, ProducerMode, Sequencer};
pub use wait::{BlockingWait, BusySpinWait, WaitStrategy, WaitStrategyKind, YieldingWait};
