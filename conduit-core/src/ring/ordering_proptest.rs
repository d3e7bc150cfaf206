//! Property-based tests for ring ordering and gating
//!
//! Random capacities, producer counts and event counts, with a two-stage
//! consumer chain. Every consumer must see each sequence exactly once, in
//! ascending order, with the slot still holding the value written for that
//! sequence (i.e. never overwritten by the next lap before release).

#[cfg(test)]
mod tests {
    use crate::ring::{
        BackpressurePolicy, ProducerMode, RingBuffer, Sequence, SequenceBarrier, WaitStrategyKind,
    };
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    fn spawn_consumer(
        barrier: SequenceBarrier,
        own: Arc<Sequence>,
        ring: Arc<RingBuffer<u64>>,
        total: u64,
    ) -> thread::JoinHandle<Vec<u64>> {
        thread::spawn(move || {
            let mut seen = Vec::with_capacity(total as usize);
            let mut next = 1;
            while next <= total {
                let available = barrier.wait_for(next).unwrap();
                while next <= available {
                    seen.push(unsafe { *ring.get(next) });
                    own.set(next);
                    next += 1;
                }
            }
            seen
        })
    }

    fn run_chain(capacity: usize, producers: usize, per_producer: u64) -> (Vec<u64>, Vec<u64>) {
        let mode = if producers > 1 {
            ProducerMode::Multi
        } else {
            ProducerMode::Single
        };
        let ring = Arc::new(
            RingBuffer::<u64>::new(
                capacity,
                mode,
                BackpressurePolicy::Block,
                WaitStrategyKind::Yielding.build(),
            )
            .unwrap(),
        );
        let total = producers as u64 * per_producer;

        let first = Sequence::shared();
        let second = Sequence::shared();
        ring.add_gating_sequences(&[second.clone()]);

        let first_barrier = ring.new_barrier(Vec::new());
        let second_barrier = ring.new_barrier(vec![first.clone()]);

        let c1 = spawn_consumer(first_barrier, first.clone(), ring.clone(), total);
        let c2 = spawn_consumer(second_barrier, second.clone(), ring.clone(), total);

        let producers: Vec<_> = (0..producers)
            .map(|_| {
                let ring = ring.clone();
                thread::spawn(move || {
                    for _ in 0..per_producer {
                        ring.publish(|seq, slot| *slot = seq).unwrap();
                    }
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        (c1.join().unwrap(), c2.join().unwrap())
    }

    /// Property: each stage sees 1..=N exactly once, in order, unclobbered
    #[test]
    fn prop_chain_sees_every_sequence_in_order() {
        proptest!(ProptestConfig::with_cases(24), |(
            capacity_pow in 1u32..6,
            producers in 1usize..4,
            per_producer in 1u64..150,
        )| {
            let capacity = 1usize << capacity_pow;
            let (first, second) = run_chain(capacity, producers, per_producer);
            let expected: Vec<u64> = (1..=producers as u64 * per_producer).collect();

            prop_assert_eq!(&first, &expected);
            prop_assert_eq!(&second, &expected);
        });
    }

    /// Property: with Reject, a full ring refuses exactly at capacity + 1
    #[test]
    fn prop_reject_at_capacity() {
        proptest!(|(capacity_pow in 1u32..10)| {
            let capacity = 1usize << capacity_pow;
            let ring = RingBuffer::<u64>::new(
                capacity,
                ProducerMode::Single,
                BackpressurePolicy::Reject,
                WaitStrategyKind::BusySpin.build(),
            )
            .unwrap();
            ring.add_gating_sequences(&[Sequence::shared()]);

            for _ in 0..capacity {
                prop_assert!(ring.publish(|seq, slot| *slot = seq).is_ok());
            }
            prop_assert!(ring.publish(|seq, slot| *slot = seq).is_err());
            prop_assert_eq!(ring.cursor(), capacity as u64);
        });
    }
}
