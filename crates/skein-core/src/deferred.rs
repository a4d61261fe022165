//! Single-assignment, cross-thread result cell.
//!
//! A [`Deferred`] starts empty and is resolved exactly once by its
//! producer. Any number of holders may poll [`is_ready`](Deferred::is_ready),
//! borrow the value once it exists, or block until it does.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Shared state behind every clone of a [`Deferred`].
struct Inner<T> {
    value: OnceLock<T>,
    /// Guards the wait/notify handshake only; the value itself is
    /// published through `OnceLock`.
    lock: Mutex<()>,
    resolved: Condvar,
}

/// A single-assignment result cell shared between one producer and any
/// number of readers.
///
/// Cloning a `Deferred` produces another handle to the same cell; the cell
/// lives as long as its longest holder.
///
/// # Resolution rules
///
/// - [`set`](Deferred::set) transitions Empty → Ready exactly once.
///   Resolving twice is a logic bug in the producer: debug builds panic,
///   release builds keep the first value and log an error.
/// - [`get`](Deferred::get) must only be called once the cell is ready.
///   Use [`try_get`](Deferred::try_get) to poll or [`wait`](Deferred::wait)
///   to block.
pub struct Deferred<T> {
    inner: Arc<Inner<T>>,
}

// Compile-time assertion: Deferred must be Send + Sync for Send + Sync payloads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Deferred<Vec<u8>>>();
};

impl<T> Deferred<T> {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                value: OnceLock::new(),
                lock: Mutex::new(()),
                resolved: Condvar::new(),
            }),
        }
    }

    /// Create a cell that is already resolved with `value`.
    ///
    /// Calling [`set`](Deferred::set) on the result is a double resolution.
    pub fn resolved(value: T) -> Self {
        let cell = Self::new();
        // A fresh OnceLock cannot already hold a value.
        let _ = cell.inner.value.set(value);
        cell
    }

    /// Resolve the cell and wake every blocked reader.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the cell was already resolved.
    pub fn set(&self, value: T) {
        if self.inner.value.set(value).is_err() {
            if cfg!(debug_assertions) {
                panic!(
                    "Deferred<{}> resolved twice",
                    std::any::type_name::<T>()
                );
            }
            tracing::error!(
                value_type = std::any::type_name::<T>(),
                "deferred value resolved twice, keeping the first value"
            );
            return;
        }
        // Taking the lock orders this notify after any reader that saw
        // the cell empty and is about to wait.
        let _guard = self.inner.lock.lock();
        self.inner.resolved.notify_all();
    }

    /// Whether the cell has been resolved. Never blocks.
    pub fn is_ready(&self) -> bool {
        self.inner.value.get().is_some()
    }

    /// Borrow the value if the cell is resolved. Never blocks.
    pub fn try_get(&self) -> Option<&T> {
        self.inner.value.get()
    }

    /// Borrow the value of a resolved cell.
    ///
    /// # Panics
    ///
    /// Panics if the cell is still empty. Polling contexts must check
    /// [`is_ready`](Deferred::is_ready) first.
    pub fn get(&self) -> &T {
        match self.inner.value.get() {
            Some(value) => value,
            None => panic!(
                "Deferred<{}>::get called before the value was ready",
                std::any::type_name::<T>()
            ),
        }
    }

    /// Block the calling thread until the cell is resolved.
    pub fn wait(&self) -> &T {
        if let Some(value) = self.inner.value.get() {
            return value;
        }
        let mut guard = self.inner.lock.lock();
        loop {
            if let Some(value) = self.inner.value.get() {
                return value;
            }
            self.inner.resolved.wait(&mut guard);
        }
    }

    /// Block until the cell is resolved or `timeout` elapses.
    ///
    /// Returns `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<&T> {
        if let Some(value) = self.inner.value.get() {
            return Some(value);
        }
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock();
        loop {
            if let Some(value) = self.inner.value.get() {
                return Some(value);
            }
            if self
                .inner
                .resolved
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                return self.inner.value.get();
            }
        }
    }

    /// Whether two handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles to this cell.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.value.get() {
            Some(value) => f.debug_tuple("Deferred::Ready").field(value).finish(),
            None => f.write_str("Deferred::Empty"),
        }
    }
}
