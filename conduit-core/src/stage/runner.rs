//! Stage processing loop
//!
//! ```text
//! loop {
//!     available = barrier.wait_for(next)?      // suspend; Alerted => exit
//!     for seq in next..=available {            // whole batch, in order
//!         skip if rejected upstream (unless the stage observes rejects)
//!         outcome = catch_unwind(process_one)
//!           Forward      -> pass on
//!           Reject(r)    -> stamp Disposition::Rejected
//!           Park         -> backoff + retry, then RetriesExhausted
//!           panic        -> stamp StageFault (FailStage: halt + exit)
//!         sequence.set(seq)                    // release to next stage
//!     }
//! }
//! ```
//!
//! A batch already authorized by the barrier is always finished before the
//! runner looks at the halt flag again.

use super::{FailurePolicy, Stage, StageOutcome};
use crate::core::{clock, BarrierError, EventSlot, RejectReason};
use crate::metrics::{names, MetricsSink, StageCounters};
use crate::resilience::{payload_message, BackoffConfig, ExponentialBackoff};
use crate::ring::{RingBuffer, Sequence, SequenceBarrier};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a runner stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerExit {
    /// Pipeline halted (normal stop)
    Halted,
    /// `FailStage` policy: the stage panicked on `sequence`
    Faulted { sequence: u64, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSummary {
    pub stage: &'static str,
    pub exit: RunnerExit,
    /// Last sequence the stage released
    pub last_sequence: u64,
}

pub struct StageRunner {
    stage: Box<dyn Stage>,
    ring: Arc<RingBuffer<EventSlot>>,
    barrier: SequenceBarrier,
    sequence: Arc<Sequence>,
    counters: Arc<StageCounters>,
    metrics: Arc<dyn MetricsSink>,
    backoff: BackoffConfig,
    failure_policy: FailurePolicy,
}

enum SlotResult {
    Done,
    StageFailed(String),
}

impl StageRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stage: Box<dyn Stage>,
        ring: Arc<RingBuffer<EventSlot>>,
        barrier: SequenceBarrier,
        sequence: Arc<Sequence>,
        counters: Arc<StageCounters>,
        metrics: Arc<dyn MetricsSink>,
        backoff: BackoffConfig,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            stage,
            ring,
            barrier,
            sequence,
            counters,
            metrics,
            backoff,
            failure_policy,
        }
    }

    pub fn name(&self) -> &'static str {
        self.stage.name()
    }

    /// Run until the ring is halted (or the stage fails under `FailStage`)
    pub fn run(mut self) -> RunnerSummary {
        let name = self.stage.name();
        let ring = self.ring.clone();
        let mut next = self.sequence.get() + 1;

        self.stage.on_start();
        info!(stage = name, start = next, "Stage started");

        let exit = 'outer: loop {
            let available = match self.barrier.wait_for(next) {
                Ok(available) => available,
                Err(BarrierError::Alerted) => break RunnerExit::Halted,
            };

            while next <= available {
                // SAFETY: the barrier authorized `next`, upstream stages have
                // released it, and this stage has not, so no other thread
                // touches the slot until `sequence.set(next)` below.
                let slot = unsafe { ring.get_mut(next) };

                let result = self.process_slot(slot);
                self.sequence.set(next);

                if let SlotResult::StageFailed(message) = result {
                    error!(stage = name, sequence = next, "Stage failed; halting pipeline");
                    ring.halt();
                    break 'outer RunnerExit::Faulted {
                        sequence: next,
                        message,
                    };
                }
                next += 1;
            }
        };

        self.stage.on_shutdown();
        let last_sequence = self.sequence.get();
        info!(stage = name, last_sequence, exit = ?exit, "Stage stopped");

        RunnerSummary {
            stage: name,
            exit,
            last_sequence,
        }
    }

    fn process_slot(&mut self, slot: &mut EventSlot) -> SlotResult {
        let name = self.stage.name();

        if slot.event().is_none() || (slot.is_rejected() && !self.stage.observes_rejected()) {
            self.counters.inc_skipped();
            return SlotResult::Done;
        }

        self.counters.inc_processed();
        let start = clock::monotonic_ns();
        let mut backoff: Option<ExponentialBackoff> = None;
        let mut attempts: u32 = 0;

        let result = loop {
            attempts += 1;
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| self.stage.process_one(slot)));

            match outcome {
                Ok(StageOutcome::Forward) => {
                    self.counters.inc_forwarded();
                    break SlotResult::Done;
                }
                Ok(StageOutcome::Reject(reason)) => {
                    debug!(stage = name, sequence = ?slot.sequence(), %reason, "Event rejected");
                    slot.reject(name, reason);
                    self.counters.inc_rejected();
                    break SlotResult::Done;
                }
                Ok(StageOutcome::Park) => {
                    self.counters.inc_parked();
                    let backoff = backoff
                        .get_or_insert_with(|| ExponentialBackoff::with_config(self.backoff.clone()));

                    let delay = if self.barrier.is_alerted() {
                        None
                    } else {
                        backoff.next_delay()
                    };

                    match delay {
                        Some(delay) => {
                            if !delay.is_zero() {
                                std::thread::sleep(delay);
                            }
                        }
                        None => {
                            warn!(stage = name, sequence = ?slot.sequence(), attempts, "Retries exhausted");
                            slot.reject(name, RejectReason::RetriesExhausted { attempts });
                            self.counters.inc_rejected();
                            self.metrics.record(names::RETRIES_EXHAUSTED, 1);
                            break SlotResult::Done;
                        }
                    }
                }
                Err(payload) => {
                    let message = payload_message(payload.as_ref());
                    error!(stage = name, sequence = ?slot.sequence(), %message, "Stage panicked");
                    slot.reject(name, RejectReason::StageFault);
                    self.counters.inc_faults();
                    self.counters.inc_rejected();
                    self.metrics.record(names::STAGE_FAULTS, 1);

                    break match self.failure_policy {
                        FailurePolicy::FailEvent => SlotResult::Done,
                        FailurePolicy::FailStage => SlotResult::StageFailed(message),
                    };
                }
            }
        };

        let elapsed = clock::monotonic_ns().saturating_sub(start);
        self.counters.add_latency(elapsed);
        self.metrics.record_latency(name, elapsed);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        CorrelationId, EventPayload, MarketDataTick, Symbol, TradingEvent, ValidationFailure,
    };
    use crate::metrics::NoopMetrics;
    use crate::ring::{BackpressurePolicy, ProducerMode, WaitStrategyKind};
    use parking_lot::Mutex;
    use std::thread;
    use std::time::Duration;

    /// Scripted stage: decides per sequence, records what it saw
    struct Scripted {
        seen: Arc<Mutex<Vec<u64>>>,
        decide: fn(u64, u32) -> StageOutcome,
        calls: u32,
    }

    impl Stage for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn process_one(&mut self, slot: &mut EventSlot) -> StageOutcome {
            let seq = slot.sequence().unwrap_or(0);
            self.calls += 1;
            self.seen.lock().push(seq);
            (self.decide)(seq, self.calls)
        }
    }

    fn tick() -> TradingEvent {
        TradingEvent::new(
            CorrelationId(1),
            0,
            EventPayload::MarketDataTick(MarketDataTick {
                symbol: Symbol::new("X").unwrap(),
                bid_price: 1,
                bid_quantity: 1,
                ask_price: 2,
                ask_quantity: 1,
            }),
        )
    }

    struct Harness {
        ring: Arc<RingBuffer<EventSlot>>,
        sequence: Arc<Sequence>,
        counters: Arc<StageCounters>,
        seen: Arc<Mutex<Vec<u64>>>,
        handle: thread::JoinHandle<RunnerSummary>,
    }

    fn spawn(decide: fn(u64, u32) -> StageOutcome, policy: FailurePolicy, retries: u32) -> Harness {
        let ring = Arc::new(
            RingBuffer::new(
                16,
                ProducerMode::Single,
                BackpressurePolicy::Block,
                WaitStrategyKind::Yielding.build(),
            )
            .unwrap(),
        );
        let sequence = Sequence::shared();
        ring.add_gating_sequences(&[sequence.clone()]);
        let counters = Arc::new(StageCounters::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let runner = StageRunner::new(
            Box::new(Scripted {
                seen: seen.clone(),
                decide,
                calls: 0,
            }),
            ring.clone(),
            ring.new_barrier(Vec::new()),
            sequence.clone(),
            counters.clone(),
            Arc::new(NoopMetrics),
            BackoffConfig::immediate(retries),
            policy,
        );
        let handle = thread::spawn(move || runner.run());

        Harness {
            ring,
            sequence,
            counters,
            seen,
            handle,
        }
    }

    fn publish(ring: &RingBuffer<EventSlot>, n: u64) {
        for _ in 0..n {
            ring.publish(|seq, slot| slot.fill(seq, tick(), 0, 0)).unwrap();
        }
    }

    fn wait_for_sequence(sequence: &Sequence, target: u64) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while sequence.get() < target {
            assert!(std::time::Instant::now() < deadline, "runner stalled");
            thread::yield_now();
        }
    }

    #[test]
    fn test_processes_in_order_and_stops_on_halt() {
        let h = spawn(|_, _| StageOutcome::Forward, FailurePolicy::FailEvent, 0);
        publish(&h.ring, 10);
        wait_for_sequence(&h.sequence, 10);

        h.ring.halt();
        let summary = h.handle.join().unwrap();
        assert_eq!(summary.exit, RunnerExit::Halted);
        assert_eq!(summary.last_sequence, 10);
        assert_eq!(*h.seen.lock(), (1..=10).collect::<Vec<_>>());
        assert_eq!(h.counters.snapshot().forwarded, 10);
    }

    #[test]
    fn test_reject_stamps_slot_and_advances() {
        let h = spawn(
            |seq, _| {
                if seq == 2 {
                    StageOutcome::Reject(ValidationFailure::ZeroQuantity.into())
                } else {
                    StageOutcome::Forward
                }
            },
            FailurePolicy::FailEvent,
            0,
        );
        publish(&h.ring, 3);
        wait_for_sequence(&h.sequence, 3);

        let slot = unsafe { h.ring.get(2) };
        assert!(slot.is_rejected());
        assert_eq!(h.counters.snapshot().rejected, 1);

        h.ring.halt();
        h.handle.join().unwrap();
    }

    #[test]
    fn test_park_retries_then_rejects() {
        let h = spawn(|_, _| StageOutcome::Park, FailurePolicy::FailEvent, 2);
        publish(&h.ring, 1);
        wait_for_sequence(&h.sequence, 1);

        let slot = unsafe { h.ring.get(1) };
        match slot.disposition() {
            crate::core::Disposition::Rejected { stage, reason } => {
                assert_eq!(stage, "scripted");
                assert_eq!(reason, RejectReason::RetriesExhausted { attempts: 3 });
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(h.counters.snapshot().parked, 3);
        // The same slot was retried, not skipped
        assert_eq!(*h.seen.lock(), vec![1, 1, 1]);

        h.ring.halt();
        h.handle.join().unwrap();
    }

    #[test]
    fn test_park_then_succeed() {
        let h = spawn(
            |_, calls| {
                if calls < 2 {
                    StageOutcome::Park
                } else {
                    StageOutcome::Forward
                }
            },
            FailurePolicy::FailEvent,
            3,
        );
        publish(&h.ring, 1);
        wait_for_sequence(&h.sequence, 1);
        assert!(!unsafe { h.ring.get(1) }.is_rejected());

        h.ring.halt();
        h.handle.join().unwrap();
    }

    #[test]
    fn test_panic_fails_event_and_continues() {
        let h = spawn(
            |seq, _| {
                if seq == 2 {
                    panic!("boom on {}", seq);
                }
                StageOutcome::Forward
            },
            FailurePolicy::FailEvent,
            0,
        );
        publish(&h.ring, 3);
        wait_for_sequence(&h.sequence, 3);

        assert!(unsafe { h.ring.get(2) }.is_rejected());
        assert!(!unsafe { h.ring.get(3) }.is_rejected());
        assert_eq!(h.counters.snapshot().faults, 1);

        h.ring.halt();
        assert_eq!(h.handle.join().unwrap().exit, RunnerExit::Halted);
    }

    #[test]
    fn test_panic_under_fail_stage_halts() {
        let h = spawn(
            |seq, _| {
                if seq == 2 {
                    panic!("fatal");
                }
                StageOutcome::Forward
            },
            FailurePolicy::FailStage,
            0,
        );
        // The halt may land before the last publish
        for _ in 0..3 {
            let _ = h.ring.publish(|seq, slot| slot.fill(seq, tick(), 0, 0));
        }

        let summary = h.handle.join().unwrap();
        assert_eq!(
            summary.exit,
            RunnerExit::Faulted {
                sequence: 2,
                message: "fatal".to_string()
            }
        );
        assert_eq!(summary.last_sequence, 2);
        assert!(h.ring.is_halted());
    }
}
