//! Test utilities for Skein development.
//!
//! Helpers for resolving cells from another thread after a delay,
//! recording observations across threads, and installing a tracing
//! subscriber once per test binary.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use skein_core::Deferred;

/// Install a test-friendly `tracing` subscriber. Safe to call from every
/// test; only the first call in a binary takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Resolve `cell` with `value` from a new thread after `delay`.
pub fn resolve_after<T>(cell: Deferred<T>, value: T, delay: Duration) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
{
    thread::Builder::new()
        .name("resolve-after".into())
        .spawn(move || {
            thread::sleep(delay);
            cell.set(value);
        })
        .expect("failed to spawn resolver thread")
}

/// Thread-safe append-only log of observations.
pub struct Recorder<T> {
    entries: Arc<Mutex<Vec<T>>>,
}

impl<T> Recorder<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record(&self, entry: T) {
        self.entries.lock().push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<T: Clone> Recorder<T> {
    /// Copy of everything recorded so far, in record order.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.lock().clone()
    }
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}
