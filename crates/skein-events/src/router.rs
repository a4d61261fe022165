//! Fan-out of events to every queue bound under their name.

use std::fmt;

use indexmap::IndexMap;
use smallvec::SmallVec;
use skein_core::TransactionId;

use crate::event::{AsyncEvent, Event};
use crate::pool::EventQueueRef;

type QueueList<P> = SmallVec<[EventQueueRef<P>; 2]>;

/// Maps binding names to the queues observing them.
///
/// Mutation (`register`/`unregister`) needs `&mut self`; callers that
/// share a router across threads wrap it in their own lock. Delivery
/// through [`add`](Self::add) only needs `&self` and never blocks.
pub struct EventRouter<P> {
    bindings: IndexMap<String, QueueList<P>>,
}

impl<P> EventRouter<P> {
    /// Create a router with no bindings.
    pub fn new() -> Self {
        Self {
            bindings: IndexMap::new(),
        }
    }

    /// Bind `queue` to `binding`. Registering the same queue twice is a
    /// no-op.
    pub fn register(&mut self, binding: impl Into<String>, queue: EventQueueRef<P>) {
        let queues = self.bindings.entry(binding.into()).or_default();
        if !queues.iter().any(|q| q.ptr_eq(&queue)) {
            queues.push(queue);
        }
    }

    /// Remove `queue` from `binding`. The binding disappears with its last
    /// queue. Returns whether anything was removed.
    pub fn unregister(&mut self, binding: &str, queue: &EventQueueRef<P>) -> bool {
        let Some(queues) = self.bindings.get_mut(binding) else {
            return false;
        };
        let before = queues.len();
        queues.retain(|q| !q.ptr_eq(queue));
        let removed = queues.len() != before;
        if queues.is_empty() {
            self.bindings.shift_remove(binding);
        }
        removed
    }

    /// Queues bound under `binding`.
    pub fn queues(&self, binding: &str) -> &[EventQueueRef<P>] {
        self.bindings
            .get(binding)
            .map(|queues| queues.as_slice())
            .unwrap_or(&[])
    }

    /// Binding names in registration order.
    pub fn bindings(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

impl<P: Clone> EventRouter<P> {
    /// Deliver `event`, raised under `transaction`, to every queue bound
    /// to its name. Returns how many queues accepted it.
    pub fn add(&self, event: &Event<P>, transaction: TransactionId) -> usize {
        self.queues(&event.name)
            .iter()
            .filter(|queue| queue.add_event(event.clone(), transaction))
            .count()
    }

    /// Deliver an asynchronous event to every queue bound to its name.
    ///
    /// All queues share one payload cell. Returns how many queues accepted
    /// the event.
    pub fn add_async(&self, event: &AsyncEvent<P>) -> usize {
        self.queues(&event.name)
            .iter()
            .filter(|queue| queue.add(event.clone()))
            .count()
    }
}

impl<P> Default for EventRouter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for EventRouter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.bindings.iter().map(|(name, queues)| (name, queues.len())))
            .finish()
    }
}
