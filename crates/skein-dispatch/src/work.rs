//! Queued work items.
//!
//! A work item couples a callable with its dependency tuple and output
//! cell. Workers only run an item once [`WorkItem::is_ready`] holds; a
//! forced flush runs it regardless and blocks inside the dependency
//! resolution instead.

use skein_core::{Deferred, Dependencies};

use crate::queue::Shared;

/// Type-erased queued work.
pub(crate) trait WorkItem: Send {
    /// Whether every input is resolved.
    fn is_ready(&self) -> bool;

    /// Resolve inputs, run, and resolve the output.
    fn run(self: Box<Self>, queue: &Shared);
}

/// A callable whose return value resolves the output directly.
pub(crate) struct Task<D, F, R> {
    pub(crate) deps: D,
    pub(crate) func: F,
    pub(crate) output: Deferred<R>,
}

impl<D, F, R> WorkItem for Task<D, F, R>
where
    D: Dependencies,
    F: FnOnce(D::Values) -> R + Send + 'static,
    R: Send + Sync + 'static,
{
    fn is_ready(&self) -> bool {
        self.deps.all_ready()
    }

    fn run(self: Box<Self>, _queue: &Shared) {
        let Task { deps, func, output } = *self;
        output.set(func(deps.resolve_all()));
    }
}

/// A callable returning another cell; the output follows that cell.
pub(crate) struct ChainedTask<D, F, R> {
    pub(crate) deps: D,
    pub(crate) func: F,
    pub(crate) output: Deferred<R>,
}

impl<D, F, R> WorkItem for ChainedTask<D, F, R>
where
    D: Dependencies,
    F: FnOnce(D::Values) -> Deferred<R> + Send + 'static,
    R: Clone + Send + Sync + 'static,
{
    fn is_ready(&self) -> bool {
        self.deps.all_ready()
    }

    fn run(self: Box<Self>, queue: &Shared) {
        let ChainedTask { deps, func, output } = *self;
        let inner = func(deps.resolve_all());
        queue.push_continuation(Box::new(Forward { inner, output }));
    }
}

/// Continuation copying a resolved inner cell into an outer one.
struct Forward<R> {
    inner: Deferred<R>,
    output: Deferred<R>,
}

impl<R: Clone + Send + Sync + 'static> WorkItem for Forward<R> {
    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn run(self: Box<Self>, _queue: &Shared) {
        self.output.set(self.inner.wait().clone());
    }
}
