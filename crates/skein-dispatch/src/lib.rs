//! Bounded worker pool running callables once their inputs resolve.
//!
//! A [`DispatchQueue`] owns a fixed set of named OS threads and an
//! insertion-ordered list of pending work. Each dispatch packages a
//! callable with a tuple of [`Awaitable`](skein_core::Awaitable) inputs
//! and hands back a [`Deferred`](skein_core::Deferred) for its result.
//!
//! # Worker loop
//!
//! ```text
//! wait on condvar while empty
//!   └─► pass over a snapshot of the queue length
//!         ready?   ── yes ─► run outside the lock, resolve output
//!                  ── no ──► requeue at the back
//!       no progress ─► wait poll_interval (or yield), then retry
//! ```
//!
//! Items are never cancelled individually. The only way to stop pending
//! work is [`DispatchQueue::shutdown`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod queue;
mod work;

pub use config::{DispatchConfig, DispatchError};
pub use queue::{DispatchQueue, ShutdownReport};
