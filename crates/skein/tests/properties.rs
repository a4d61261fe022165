//! Property tests spanning the public API.

use std::thread;

use proptest::prelude::*;
use skein::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A cell set once yields the same value to every reader, however
    /// often readiness is checked first.
    #[test]
    fn deferred_value_round_trips(value in any::<i64>(), readers in 1usize..6, checks in 0usize..10) {
        let cell = Deferred::new();
        let handles: Vec<_> = (0..readers)
            .map(|_| {
                let cell = cell.clone();
                thread::spawn(move || {
                    for _ in 0..checks {
                        let _ = cell.is_ready();
                    }
                    *cell.wait()
                })
            })
            .collect();
        cell.set(value);
        for handle in handles {
            prop_assert_eq!(handle.join().unwrap(), value);
        }
        prop_assert_eq!(cell.get(), &value);
    }

    /// No poll ever returns an event raised by the viewer's own or a later
    /// transaction, and visible events come back in order.
    #[test]
    fn transaction_gate_holds(
        txns in proptest::collection::vec(0u64..8, 1..40),
        viewers in proptest::collection::vec(0u64..10, 1..40),
    ) {
        let pool: EventQueuePool<(u64, usize)> = EventQueuePool::new(EventQueuePoolConfig {
            queue_capacity: 64,
            block_size: 1,
        }).unwrap();
        let queue = pool.new_queue();
        for (seq, &txn) in txns.iter().enumerate() {
            prop_assert!(queue.add_event(Event::new("/p", SourceId(0), (txn, seq)), TransactionId(txn)));
        }

        let mut last_seq = None;
        for &viewer in &viewers {
            while let Some(event) = queue.poll(TransactionId(viewer)) {
                let (txn, seq) = event.payload;
                prop_assert!(
                    !TransactionId(txn).hidden_from(TransactionId(viewer)),
                    "event from txn {} delivered to viewer {}", txn, viewer
                );
                prop_assert!(last_seq.map_or(true, |last| seq > last));
                last_seq = Some(seq);
            }
        }
    }

    /// Marking an index valid several times before a publish is the same
    /// as marking it once.
    #[test]
    fn make_item_valid_idempotent(marks in proptest::collection::vec(0usize..6, 1..30)) {
        let mut once: LockFreeIndexSet<()> = LockFreeIndexSet::new(6);
        let mut repeated: LockFreeIndexSet<()> = LockFreeIndexSet::new(6);
        for _ in 0..6 {
            once.allocate_item();
            repeated.allocate_item();
        }
        let mut seen = Vec::new();
        for &index in &marks {
            repeated.make_item_valid(index);
            if !seen.contains(&index) {
                once.make_item_valid(index);
                seen.push(index);
            }
        }
        once.update_indexes();
        repeated.update_indexes();
        let (a, b) = (once.valid_indexes(), repeated.valid_indexes());
        prop_assert_eq!(a.as_slice(), b.as_slice());
    }
}
