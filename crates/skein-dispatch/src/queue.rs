//! The dispatch queue and its worker loop.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use skein_core::{Deferred, Dependencies};

use crate::config::{DispatchConfig, DispatchError};
use crate::work::{ChainedTask, Task, WorkItem};

// ── Shared state ───────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Running,
    /// Shutting down; workers finish every queued item first.
    Draining,
    /// Shutting down; workers stop after their in-flight item.
    Stopping,
}

struct State {
    items: VecDeque<Box<dyn WorkItem>>,
    lifecycle: Lifecycle,
}

/// State shared between the queue handle and its workers.
pub(crate) struct Shared {
    name: String,
    poll_interval: Option<Duration>,
    state: Mutex<State>,
    work_available: Condvar,
    /// Worker threads that have not exited yet.
    live_workers: AtomicUsize,
}

impl Shared {
    /// Enqueue work produced by a running item. Allowed while draining.
    pub(crate) fn push_continuation(&self, item: Box<dyn WorkItem>) {
        self.state.lock().items.push_back(item);
        self.work_available.notify_one();
    }

    /// Back off after a pass that ran nothing.
    fn idle(&self, state: &mut MutexGuard<'_, State>) {
        tracing::trace!(queue = %self.name, pending = state.items.len(), "idle dispatch pass");
        match self.poll_interval {
            // A new dispatch cuts the wait short.
            Some(interval) => {
                self.work_available.wait_for(state, interval);
            }
            None => MutexGuard::unlocked(state, thread::yield_now),
        }
    }
}

// ── ShutdownReport ─────────────────────────────────────────────

/// Outcome of [`DispatchQueue::shutdown`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Worker threads joined cleanly.
    pub workers_joined: usize,
    /// Worker threads that died from a panicking callable.
    pub workers_panicked: usize,
    /// Queued items dropped without running. Their output cells never
    /// resolve.
    pub discarded: usize,
}

// ── DispatchQueue ──────────────────────────────────────────────

/// A fixed pool of worker threads running callables once their inputs
/// are resolved.
///
/// Every dispatch returns a [`Deferred`] for the callable's result. Items
/// whose dependencies are not ready go to the back of the queue and are
/// rechecked on the next pass, so completion order follows readiness
/// rather than submission order.
///
/// Dropping the queue is [`shutdown(false)`](Self::shutdown): pending work
/// is discarded, never waited on.
pub struct DispatchQueue {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

// Compile-time assertion: DispatchQueue must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<DispatchQueue>();
};

impl DispatchQueue {
    /// Validate `config` and spawn the worker threads.
    pub fn new(config: DispatchConfig) -> Result<Self, DispatchError> {
        config.validate()?;
        let shared = Arc::new(Shared {
            name: config.name,
            poll_interval: config.poll_interval,
            state: Mutex::new(State {
                items: VecDeque::new(),
                lifecycle: Lifecycle::Running,
            }),
            work_available: Condvar::new(),
            live_workers: AtomicUsize::new(0),
        });

        let queue = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(config.thread_count)),
        };
        for i in 0..config.thread_count {
            let shared = Arc::clone(&queue.shared);
            queue.shared.live_workers.fetch_add(1, Ordering::AcqRel);
            let spawned = thread::Builder::new()
                .name(format!("{}-{i}", queue.shared.name))
                .spawn(move || worker_loop(&shared));
            match spawned {
                Ok(handle) => queue.workers.lock().push(handle),
                Err(e) => {
                    queue.shared.live_workers.fetch_sub(1, Ordering::AcqRel);
                    // Dropping `queue` stops and joins the workers spawned so far.
                    return Err(DispatchError::Spawn(e));
                }
            }
        }

        tracing::debug!(
            queue = %queue.shared.name,
            threads = config.thread_count,
            poll_interval = ?config.poll_interval,
            "dispatch queue started"
        );
        Ok(queue)
    }

    /// The queue's name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    fn enqueue(&self, item: Box<dyn WorkItem>) {
        let mut state = self.shared.state.lock();
        assert!(
            state.lifecycle == Lifecycle::Running,
            "tried to dispatch to a shut down queue `{}`",
            self.shared.name
        );
        state.items.push_back(item);
        drop(state);
        self.shared.work_available.notify_one();
    }

    /// Run `func` on a worker thread.
    ///
    /// # Panics
    ///
    /// Panics if the queue has been shut down.
    pub fn dispatch<R, F>(&self, func: F) -> Deferred<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + Sync + 'static,
    {
        self.dispatch_after((), move |()| func())
    }

    /// Run `func` once every member of `deps` is ready, passing their
    /// values.
    ///
    /// # Panics
    ///
    /// Panics if the queue has been shut down.
    pub fn dispatch_after<D, R, F>(&self, deps: D, func: F) -> Deferred<R>
    where
        D: Dependencies,
        F: FnOnce(D::Values) -> R + Send + 'static,
        R: Send + Sync + 'static,
    {
        let output = Deferred::new();
        self.enqueue(Box::new(Task {
            deps,
            func,
            output: output.clone(),
        }));
        output
    }

    /// Like [`dispatch_after`](Self::dispatch_after) for a callable that
    /// itself returns a cell. The returned cell resolves with the inner
    /// cell's value once that is ready, through a continuation queued on
    /// this queue.
    ///
    /// # Panics
    ///
    /// Panics if the queue has been shut down.
    pub fn dispatch_chained<D, R, F>(&self, deps: D, func: F) -> Deferred<R>
    where
        D: Dependencies,
        F: FnOnce(D::Values) -> Deferred<R> + Send + 'static,
        R: Clone + Send + Sync + 'static,
    {
        let output = Deferred::new();
        self.enqueue(Box::new(ChainedTask {
            deps,
            func,
            output: output.clone(),
        }));
        output
    }

    /// Worker threads still running. Drops below the configured count
    /// when a callable panics and takes its worker down.
    pub fn live_workers(&self) -> usize {
        self.shared.live_workers.load(Ordering::Acquire)
    }

    /// Number of items waiting to run.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    /// Drain up to the current queue length on the calling thread.
    ///
    /// With `block_until_ready` false, unready items go back on the queue.
    /// With it true, every item in the snapshot runs, blocking on its
    /// inputs as needed. Work queued while flushing (continuations
    /// included) is left for the workers or the next flush.
    pub fn flush(&self, block_until_ready: bool) {
        let mut state = self.shared.state.lock();
        let budget = state.items.len();
        for _ in 0..budget {
            let Some(item) = state.items.pop_front() else {
                break;
            };
            if block_until_ready || item.is_ready() {
                MutexGuard::unlocked(&mut state, || item.run(&self.shared));
            } else {
                state.items.push_back(item);
            }
        }
    }

    /// Stop the workers and join them.
    ///
    /// With `wait_for_exit` true, workers first run every queued item,
    /// waiting for dependencies as long as it takes. With it false,
    /// workers finish their in-flight item and the rest is discarded.
    /// Further dispatches panic either way. Calling this again returns an
    /// empty report.
    pub fn shutdown(&self, wait_for_exit: bool) -> ShutdownReport {
        {
            let mut state = self.shared.state.lock();
            state.lifecycle = match (state.lifecycle, wait_for_exit) {
                (Lifecycle::Running, true) => Lifecycle::Draining,
                (Lifecycle::Draining, true) => Lifecycle::Draining,
                _ => Lifecycle::Stopping,
            };
        }
        self.shared.work_available.notify_all();

        let handles = std::mem::take(&mut *self.workers.lock());
        let current = thread::current().id();
        let mut report = ShutdownReport::default();
        for handle in handles {
            // A callable shutting down its own queue cannot join itself.
            if handle.thread().id() == current {
                continue;
            }
            let worker = handle.thread().name().unwrap_or("<unnamed>").to_owned();
            match handle.join() {
                Ok(()) => report.workers_joined += 1,
                Err(_) => {
                    report.workers_panicked += 1;
                    tracing::error!(queue = %self.shared.name, %worker, "dispatch worker panicked");
                }
            }
        }

        let discarded: Vec<_> = {
            let mut state = self.shared.state.lock();
            state.lifecycle = Lifecycle::Stopping;
            state.items.drain(..).collect()
        };
        report.discarded = discarded.len();
        drop(discarded);

        tracing::debug!(
            queue = %self.shared.name,
            joined = report.workers_joined,
            panicked = report.workers_panicked,
            discarded = report.discarded,
            "dispatch queue shut down"
        );
        report
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        if !self.workers.get_mut().is_empty() {
            self.shutdown(false);
        }
    }
}

impl fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("DispatchQueue")
            .field("name", &self.shared.name)
            .field("lifecycle", &state.lifecycle)
            .field("pending", &state.items.len())
            .field("workers", &self.workers.lock().len())
            .field("live_workers", &self.live_workers())
            .finish()
    }
}

// ── Worker loop ────────────────────────────────────────────────

/// Accounts for a worker's exit, and reports it at once if a callable
/// panicked.
struct WorkerExit<'a> {
    shared: &'a Shared,
}

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        let remaining = self.shared.live_workers.fetch_sub(1, Ordering::AcqRel) - 1;
        if thread::panicking() {
            let current = thread::current();
            tracing::error!(
                queue = %self.shared.name,
                worker = current.name().unwrap_or("<unnamed>"),
                remaining,
                "dispatch worker died from a panicking callable"
            );
        }
    }
}

fn worker_loop(shared: &Shared) {
    let _exit = WorkerExit { shared };
    let mut state = shared.state.lock();
    loop {
        while state.items.is_empty() && state.lifecycle == Lifecycle::Running {
            shared.work_available.wait(&mut state);
        }
        match state.lifecycle {
            Lifecycle::Stopping => return,
            Lifecycle::Draining if state.items.is_empty() => return,
            _ => {}
        }

        // One pass over the items queued right now. Unready items rotate
        // to the back so ready ones behind them still run.
        let budget = state.items.len();
        let mut progressed = false;
        for _ in 0..budget {
            if state.lifecycle == Lifecycle::Stopping {
                return;
            }
            let Some(item) = state.items.pop_front() else {
                break;
            };
            if item.is_ready() {
                MutexGuard::unlocked(&mut state, || item.run(shared));
                progressed = true;
            } else {
                state.items.push_back(item);
            }
        }

        if !progressed && !state.items.is_empty() {
            shared.idle(&mut state);
        }
    }
}
