//! Benchmark fixtures for the Skein coordination core.
//!
//! Provides pre-built workloads shared by the criterion benches:
//!
//! - [`populated_index_set`]: an index set with `live` published items
//! - [`bench_pool`]: an event queue pool sized for burst benchmarks
//! - [`fill_queue`]: push untagged events until a queue holds `count`

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::AtomicU64;

use skein_core::{SourceId, TransactionId};
use skein_events::{Event, EventQueue, EventQueuePool, EventQueuePoolConfig};
use skein_index::LockFreeIndexSet;

/// Capacity of every queue in [`bench_pool`].
pub const BENCH_QUEUE_CAPACITY: usize = 4096;

/// An index set of `capacity` slots with the first `live` indices
/// allocated, valid and published.
pub fn populated_index_set(capacity: usize, live: usize) -> LockFreeIndexSet<AtomicU64> {
    let mut set = LockFreeIndexSet::new(capacity);
    for _ in 0..live {
        let index = set.allocate_item();
        set.make_item_valid(index);
    }
    set.update_indexes();
    set
}

/// An event queue pool whose queues hold [`BENCH_QUEUE_CAPACITY`] slots.
pub fn bench_pool() -> EventQueuePool<u64> {
    EventQueuePool::new(EventQueuePoolConfig {
        queue_capacity: BENCH_QUEUE_CAPACITY,
        block_size: 4,
    })
    .unwrap()
}

/// Push untagged events numbered `0..count` into `queue`.
///
/// Returns how many were accepted.
pub fn fill_queue(queue: &EventQueue<u64>, count: u64) -> u64 {
    (0..count)
        .filter(|&i| queue.add_event(Event::new("/bench", SourceId(i), i), TransactionId::NONE))
        .count() as u64
}
