//! Transactional multi-producer, single-consumer event queues.
//!
//! Any thread may [`add`](EventQueue::add) events to an [`EventQueue`];
//! exactly one consumer thread [`poll`](EventQueue::poll)s it, once per
//! tick, passing its own [`TransactionId`](skein_core::TransactionId).
//! Events raised during a transaction stay hidden from that transaction
//! and from every older one.
//!
//! Queues are handed out by an [`EventQueuePool`] as reference-counted
//! [`EventQueueRef`] handles. Dropping the last handle resets the queue
//! and returns it to the pool. An [`EventRouter`] fans events out to every
//! queue bound under the event's name.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod event;
pub mod pool;
pub mod queue;
pub mod router;

pub use event::{AsyncEvent, Event};
pub use pool::{EventQueuePool, EventQueuePoolConfig, EventQueueRef};
pub use queue::EventQueue;
pub use router::EventRouter;
