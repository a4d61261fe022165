//! Pre-allocated event queues handed out as reference-counted leases.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use skein_core::ConfigError;

use crate::queue::EventQueue;

/// Construction parameters for an [`EventQueuePool`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventQueuePoolConfig {
    /// Slot count of every queue in the pool. Default: 1000.
    pub queue_capacity: usize,
    /// Number of queues added each time the pool runs dry. Default: 64.
    pub block_size: usize,
}

impl Default for EventQueuePoolConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            block_size: 64,
        }
    }
}

impl EventQueuePoolConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity < 2 {
            return Err(ConfigError::QueueCapacityTooSmall {
                configured: self.queue_capacity,
            });
        }
        if u32::try_from(self.queue_capacity).is_err() {
            return Err(ConfigError::QueueCapacityTooLarge {
                configured: self.queue_capacity,
            });
        }
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        Ok(())
    }
}

struct PoolState<P> {
    queues: Vec<Arc<EventQueue<P>>>,
    free: Vec<usize>,
}

struct PoolInner<P> {
    config: EventQueuePoolConfig,
    state: Mutex<PoolState<P>>,
}

/// A growable pool of event queues.
///
/// Construct one explicitly and pass it to whatever creates queues. The
/// free list sits behind a plain mutex; growth happens in blocks and is
/// never on a real-time path. Queues are never deallocated individually:
/// when the last [`EventQueueRef`] to a queue is dropped the queue is
/// reset and goes back on the free list. Handles may outlive the pool, in
/// which case their queue is simply freed with them.
pub struct EventQueuePool<P> {
    inner: Arc<PoolInner<P>>,
}

impl<P> EventQueuePool<P> {
    /// Create an empty pool. Queues are allocated on first use.
    pub fn new(config: EventQueuePoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(PoolState {
                    queues: Vec::new(),
                    free: Vec::new(),
                }),
            }),
        })
    }

    /// Lease a reset queue, growing the pool by one block if none is free.
    pub fn new_queue(&self) -> EventQueueRef<P> {
        let mut state = self.inner.state.lock();
        let slot = match state.free.pop() {
            Some(slot) => slot,
            None => {
                let start = state.queues.len();
                let block = self.inner.config.block_size;
                let capacity = self.inner.config.queue_capacity;
                state
                    .queues
                    .extend((0..block).map(|_| Arc::new(EventQueue::new(capacity))));
                // Reversed so lower indices are leased first; `start` is
                // leased right away.
                state.free.extend((start + 1..start + block).rev());
                tracing::debug!(
                    allocated = state.queues.len(),
                    block,
                    queue_capacity = capacity,
                    "event queue pool grew"
                );
                start
            }
        };
        EventQueueRef {
            lease: Arc::new(Lease {
                queue: Arc::clone(&state.queues[slot]),
                slot,
                pool: Arc::downgrade(&self.inner),
            }),
        }
    }

    /// Total queues owned by the pool, leased or free.
    pub fn allocated(&self) -> usize {
        self.inner.state.lock().queues.len()
    }

    /// Queues ready to be leased without growing.
    pub fn free_count(&self) -> usize {
        self.inner.state.lock().free.len()
    }

    /// The pool's configuration.
    pub fn config(&self) -> &EventQueuePoolConfig {
        &self.inner.config
    }
}

impl<P> Clone for EventQueuePool<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for EventQueuePool<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("EventQueuePool")
            .field("config", &self.inner.config)
            .field("allocated", &state.queues.len())
            .field("free", &state.free.len())
            .finish()
    }
}

struct Lease<P> {
    queue: Arc<EventQueue<P>>,
    slot: usize,
    pool: Weak<PoolInner<P>>,
}

impl<P> Drop for Lease<P> {
    fn drop(&mut self) {
        self.queue.reset();
        if let Some(pool) = self.pool.upgrade() {
            pool.state.lock().free.push(self.slot);
        }
    }
}

/// Shared handle to a pooled [`EventQueue`].
///
/// Clones share one lease; the queue returns to its pool when the last
/// clone is dropped.
pub struct EventQueueRef<P> {
    lease: Arc<Lease<P>>,
}

impl<P> EventQueueRef<P> {
    /// Whether two handles lease the same queue.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.lease, &other.lease)
    }
}

impl<P> Deref for EventQueueRef<P> {
    type Target = EventQueue<P>;

    fn deref(&self) -> &EventQueue<P> {
        &self.lease.queue
    }
}

impl<P> Clone for EventQueueRef<P> {
    fn clone(&self) -> Self {
        Self {
            lease: Arc::clone(&self.lease),
        }
    }
}

impl<P> fmt::Debug for EventQueueRef<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueueRef")
            .field("slot", &self.lease.slot)
            .field("queue", &*self.lease.queue)
            .finish()
    }
}
