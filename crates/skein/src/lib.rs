//! Skein: cross-thread coordination for real-time simulation engines.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Skein sub-crates. For most users, adding `skein` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::time::Duration;
//! use skein::prelude::*;
//!
//! // Background work gated on an input resolved elsewhere.
//! let loader = DispatchQueue::new(DispatchConfig::new("loader", 2)).unwrap();
//! let mesh_size = Deferred::new();
//! let vertices = loader.dispatch_after((mesh_size.clone(),), |(n,): (usize,)| n * 3);
//! mesh_size.set(128);
//! assert_eq!(vertices.wait_timeout(Duration::from_secs(5)), Some(&384));
//!
//! // Events stay hidden from the transaction that raised them.
//! let pool: EventQueuePool<u32> = EventQueuePool::new(EventQueuePoolConfig::default()).unwrap();
//! let queue = pool.new_queue();
//! let clock = TransactionClock::new();
//! let txn = clock.next_id();
//! queue.add_event(Event::new("/door/open", SourceId(1), 7), txn);
//! assert!(queue.poll(txn).is_none());
//! assert_eq!(queue.poll(clock.next_id()).map(|e| e.payload), Some(7));
//!
//! // The owner publishes which slots readers may touch.
//! let mut voices: LockFreeIndexSet<std::sync::atomic::AtomicU32> = LockFreeIndexSet::new(64);
//! let voice = voices.allocate_item();
//! voices.make_item_valid(voice);
//! voices.update_indexes();
//! assert_eq!(voices.reader().valid_indexes().as_slice(), &[voice]);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `skein-core` | `Deferred`, awaitables, transaction ids, errors |
//! | [`index`] | `skein-index` | Lock-free index set, reader handle, snapshots |
//! | [`events`] | `skein-events` | Events, event queues, pool, router |
//! | [`dispatch`] | `skein-dispatch` | Dispatch queue and its configuration |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types (`skein-core`).
///
/// The single-assignment [`types::Deferred`] cell, the
/// [`types::Awaitable`] and [`types::Dependencies`] traits, transaction
/// ids and the shared error types.
pub use skein_core as types;

/// Lock-free index set (`skein-index`).
///
/// [`index::LockFreeIndexSet`] is the owner handle;
/// [`index::IndexSetReader`] is the handle for every other thread.
pub use skein_index as index;

/// Transactional event queues (`skein-events`).
///
/// Queues are leased from an [`events::EventQueuePool`] and fanned into by
/// an [`events::EventRouter`].
pub use skein_events as events;

/// Dependency-gated worker pool (`skein-dispatch`).
pub use skein_dispatch as dispatch;

/// Common imports for typical usage.
///
/// ```rust
/// use skein::prelude::*;
/// ```
///
/// This imports the deferred cell and its traits, the three coordination
/// primitives, and their configuration and error types.
pub mod prelude {
    pub use skein_core::{
        Awaitable, CapacityError, ConfigError, Deferred, Dependencies, Resolved, SourceId,
        TransactionClock, TransactionId,
    };
    pub use skein_dispatch::{DispatchConfig, DispatchError, DispatchQueue, ShutdownReport};
    pub use skein_events::{
        AsyncEvent, Event, EventQueue, EventQueuePool, EventQueuePoolConfig, EventQueueRef,
        EventRouter,
    };
    pub use skein_index::{IndexSetReader, LockFreeIndexSet, ValidIndexes};
}
