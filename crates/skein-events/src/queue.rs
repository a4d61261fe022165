//! Fixed-capacity multi-producer, single-consumer event ring.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use skein_core::{CapacityError, TransactionId};

use crate::event::{AsyncEvent, Event};

type Slot<P> = Mutex<Option<AsyncEvent<P>>>;

/// Split the packed cursor into `(head, tail)`.
fn unpack(cursor: u64) -> (u32, u32) {
    ((cursor >> 32) as u32, cursor as u32)
}

fn pack(head: u32, tail: u32) -> u64 {
    (u64::from(head) << 32) | u64::from(tail)
}

/// A ring of event slots with a packed `(head, tail)` cursor.
///
/// Any number of producers may [`add`](Self::add) concurrently; exactly
/// one consumer thread may [`poll`](Self::poll). `head == tail` means
/// empty, and one slot is always left unused so a full ring never looks
/// empty: a queue of capacity `n` holds at most `n - 1` events.
///
/// Head and tail live in one `AtomicU64` and change together through
/// compare-and-swap, so neither side ever observes a torn pair.
///
/// A producer first reserves its slot by advancing the tail, then stores
/// the event. The consumer treats a reserved slot that is still empty the
/// same way as a payload that is not ready yet: it stops, and the event is
/// delivered on a later poll in its original position.
pub struct EventQueue<P> {
    slots: Box<[Slot<P>]>,
    cursor: AtomicU64,
}

// Compile-time assertion: EventQueue must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<EventQueue<String>>();
};

impl<P> EventQueue<P> {
    /// Create an empty queue with `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity < 2` or `capacity > u32::MAX`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "EventQueue capacity must be >= 2, got {capacity}");
        assert!(
            u32::try_from(capacity).is_ok(),
            "EventQueue capacity {capacity} exceeds u32::MAX"
        );
        Self {
            slots: (0..capacity).map(|_| Mutex::new(None)).collect(),
            cursor: AtomicU64::new(0),
        }
    }

    /// Slot count of the ring. At most `capacity() - 1` events fit.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn next_pos(&self, pos: u32) -> u32 {
        ((u64::from(pos) + 1) % self.slots.len() as u64) as u32
    }

    /// Claim the slot at the tail, or report a full ring without touching
    /// the cursor.
    fn reserve(&self) -> Result<usize, CapacityError> {
        let mut current = self.cursor.load(Ordering::Acquire);
        loop {
            let (head, tail) = unpack(current);
            let next_tail = self.next_pos(tail);
            if next_tail == head {
                return Err(CapacityError::QueueFull {
                    capacity: self.capacity(),
                });
            }
            match self.cursor.compare_exchange_weak(
                current,
                pack(head, next_tail),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(tail as usize),
                Err(actual) => current = actual,
            }
        }
    }

    /// Enqueue `event`, failing without side effects if the ring is full.
    ///
    /// Never blocks on other producers or on the consumer.
    pub fn try_add(&self, event: AsyncEvent<P>) -> Result<(), CapacityError> {
        let slot = self.reserve()?;
        *self.slots[slot].lock() = Some(event);
        Ok(())
    }

    /// Enqueue `event`. Returns `false` and drops the event if the ring is
    /// full; the rejection is logged.
    pub fn add(&self, event: AsyncEvent<P>) -> bool {
        match self.reserve() {
            Ok(slot) => {
                *self.slots[slot].lock() = Some(event);
                true
            }
            Err(e) => {
                tracing::warn!(
                    event = %event.name,
                    source = event.source.0,
                    transaction = event.transaction.0,
                    "{e}, dropping event"
                );
                false
            }
        }
    }

    /// Enqueue an already-resolved event raised under `transaction`.
    pub fn add_event(&self, event: Event<P>, transaction: TransactionId) -> bool {
        self.add(AsyncEvent::from_event(event, transaction))
    }

    /// Whether the ring holds no reserved slots.
    pub fn is_empty(&self) -> bool {
        let (head, tail) = unpack(self.cursor.load(Ordering::Acquire));
        head == tail
    }

    /// Number of reserved slots between head and tail.
    pub fn size(&self) -> usize {
        let (head, tail) = unpack(self.cursor.load(Ordering::Acquire));
        if tail >= head {
            (tail - head) as usize
        } else {
            self.capacity() - head as usize + tail as usize
        }
    }

    /// Drop every queued event and rewind the cursor.
    ///
    /// Must not race with producers or the consumer; the pool calls this
    /// once the last handle to the queue is gone.
    pub fn reset(&self) {
        for slot in self.slots.iter() {
            slot.lock().take();
        }
        self.cursor.store(0, Ordering::Release);
    }

    fn advance_head(&self) {
        let mut current = self.cursor.load(Ordering::Acquire);
        loop {
            let (head, tail) = unpack(current);
            match self.cursor.compare_exchange_weak(
                current,
                pack(self.next_pos(head), tail),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Take the slot at `head` if it is visible to `viewer`.
    fn take_visible(&self, head: u32, viewer: TransactionId) -> Option<AsyncEvent<P>> {
        let mut slot = self.slots[head as usize].lock();
        let visible = match slot.as_ref() {
            // Reserved by a producer that has not stored its event yet.
            None => false,
            Some(event) => !event.transaction.hidden_from(viewer) && event.is_ready(),
        };
        if visible {
            slot.take()
        } else {
            None
        }
    }
}

impl<P: Clone> EventQueue<P> {
    /// Deliver the next event visible to `viewer`. Consumer thread only.
    ///
    /// Stops at the first event that is hidden from `viewer` or whose
    /// payload is not ready yet: nothing behind it is delivered until it
    /// is. Events whose payload resolved to `None` are skipped. Never
    /// blocks.
    pub fn poll(&self, viewer: TransactionId) -> Option<Event<P>> {
        loop {
            let (head, tail) = unpack(self.cursor.load(Ordering::Acquire));
            if head == tail {
                return None;
            }
            let event = self.take_visible(head, viewer)?;
            self.advance_head();

            if let Some(payload) = event.payload.get().clone() {
                return Some(Event {
                    name: event.name,
                    source: event.source,
                    payload,
                });
            }
        }
    }
}

impl<P> fmt::Debug for EventQueue<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (head, tail) = unpack(self.cursor.load(Ordering::Acquire));
        f.debug_struct("EventQueue")
            .field("capacity", &self.capacity())
            .field("head", &head)
            .field("tail", &tail)
            .finish()
    }
}
