//! The owner and reader handles of the index set.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use indexmap::IndexSet;
use skein_core::CapacityError;

use crate::snapshot::{Frame, ValidIndexes};

/// State visible to every thread.
struct Shared<T> {
    items: Box<[T]>,
    current: ArcSwap<Frame>,
}

/// An index freed while `epoch` was the current publication.
#[derive(Clone, Copy, Debug)]
struct Retirement {
    epoch: u64,
    index: usize,
}

/// Single-writer set of slot indices over a fixed array of items.
///
/// Every method taking `&mut self` is owner-thread only; the type is
/// `Send` but not `Clone`, so exactly one thread can hold it. Other
/// threads use an [`IndexSetReader`] obtained from
/// [`reader()`](LockFreeIndexSet::reader).
///
/// Items at published indices may be touched concurrently by the owner
/// and by readers, so `T` must be internally synchronized (atomics, small
/// locks) if more than one thread accesses it. This set only governs
/// *which* indices are safe to touch.
pub struct LockFreeIndexSet<T> {
    shared: Arc<Shared<T>>,
    /// Logical size: every index below this has been handed out at least once.
    len: usize,
    free: Vec<usize>,
    /// Per-slot ownership: set on allocation, cleared on free.
    live: Vec<bool>,
    next_valid: IndexSet<usize>,
    frames: Vec<Arc<Frame>>,
    retired: VecDeque<Retirement>,
    /// Epoch of the current publication; 0 until the first publish.
    epoch: u64,
}

// Compile-time assertion: the set and its reader can cross threads.
const _: fn() = || {
    fn assert_send<T: Send>() {}
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send::<LockFreeIndexSet<std::sync::atomic::AtomicU32>>();
    assert_send_sync::<IndexSetReader<std::sync::atomic::AtomicU32>>();
};

impl<T: Default> LockFreeIndexSet<T> {
    /// Create a set with `max_size` default-initialized slots.
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is zero.
    pub fn new(max_size: usize) -> Self {
        Self::from_fn(max_size, |_| T::default())
    }
}

impl<T> LockFreeIndexSet<T> {
    /// Create a set with `max_size` slots, initializing slot `i` with `init(i)`.
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is zero.
    pub fn from_fn(max_size: usize, init: impl FnMut(usize) -> T) -> Self {
        assert!(max_size > 0, "LockFreeIndexSet capacity must be >= 1");
        let items: Box<[T]> = (0..max_size).map(init).collect();
        Self {
            shared: Arc::new(Shared {
                items,
                current: ArcSwap::from_pointee(Frame::default()),
            }),
            len: 0,
            free: Vec::new(),
            live: vec![false; max_size],
            next_valid: IndexSet::new(),
            frames: Vec::new(),
            retired: VecDeque::new(),
            epoch: 0,
        }
    }

    /// Reserve an index. Owner thread only.
    ///
    /// Reuses a reclaimed index if one is available, otherwise grows the
    /// logical size by one. The index stays invisible to readers until
    /// [`make_item_valid`](Self::make_item_valid) and the next
    /// [`update_indexes`](Self::update_indexes).
    ///
    /// # Panics
    ///
    /// Panics if every physical slot is already allocated. Use
    /// [`try_allocate_item`](Self::try_allocate_item) to handle that case.
    pub fn allocate_item(&mut self) -> usize {
        match self.try_allocate_item() {
            Ok(index) => index,
            Err(e) => panic!("LockFreeIndexSet::allocate_item: {e}"),
        }
    }

    /// Reserve an index, reporting exhaustion as an error. Owner thread only.
    pub fn try_allocate_item(&mut self) -> Result<usize, CapacityError> {
        if let Some(index) = self.free.pop() {
            self.live[index] = true;
            return Ok(index);
        }
        let capacity = self.capacity();
        if self.len < capacity {
            self.live[self.len] = true;
            self.len += 1;
            return Ok(self.len - 1);
        }
        tracing::warn!(
            capacity,
            pending_retirements = self.retired.len(),
            "index set full, refusing allocation"
        );
        Err(CapacityError::IndexSetFull { capacity })
    }

    /// Queue `index` to appear in the next published frame. Owner thread
    /// only. Idempotent.
    ///
    /// # Panics
    ///
    /// Panics if `index` was never allocated or has been freed.
    pub fn make_item_valid(&mut self, index: usize) {
        assert!(
            index < self.len,
            "make_item_valid: index {index} was never allocated (len {})",
            self.len
        );
        assert!(
            self.live[index],
            "make_item_valid: index {index} was freed and not reallocated"
        );
        self.next_valid.insert(index);
    }

    /// Withdraw `index` from the next published frame and schedule it for
    /// reuse. Owner thread only.
    ///
    /// The index is not reusable yet: a reader may still be iterating a
    /// frame that lists it. It returns to the free pool during a later
    /// [`update_indexes`](Self::update_indexes), once no frame that could
    /// list it is still referenced.
    ///
    /// # Panics
    ///
    /// Panics if `index` was never allocated or is already free.
    pub fn free_item(&mut self, index: usize) {
        assert!(
            index < self.len,
            "free_item: index {index} was never allocated (len {})",
            self.len
        );
        assert!(self.live[index], "free_item: index {index} freed twice");
        self.live[index] = false;
        self.next_valid.swap_remove(&index);

        if self.epoch == 0 {
            // Nothing has been published, so no reader can know this index.
            self.free.push(index);
        } else {
            self.retired.push_back(Retirement {
                epoch: self.epoch,
                index,
            });
        }
    }

    /// Publish the pending-valid set as a new frame and reclaim what no
    /// reader can observe any more. Owner thread only, once per tick.
    ///
    /// Readers already holding an older snapshot keep seeing it unchanged.
    pub fn update_indexes(&mut self) {
        let current_epoch = self.epoch;

        // The current frame is always live: it is what new readers load.
        let mut oldest_live = current_epoch;
        let mut reusable = None;
        for (slot, frame) in self.frames.iter().enumerate() {
            if frame.epoch == current_epoch {
                continue;
            }
            if Arc::strong_count(frame) > 1 {
                oldest_live = oldest_live.min(frame.epoch);
            } else if reusable.is_none() {
                reusable = Some(slot);
            }
        }

        while let Some(retirement) = self.retired.front() {
            if retirement.epoch >= oldest_live {
                break;
            }
            self.free.push(retirement.index);
            self.retired.pop_front();
        }

        let next_epoch = current_epoch + 1;
        let mut indexes: Vec<usize> = self.next_valid.iter().copied().collect();
        indexes.sort_unstable();

        let slot = match reusable.and_then(|slot| {
            Arc::get_mut(&mut self.frames[slot]).map(|frame| (slot, frame))
        }) {
            Some((slot, frame)) => {
                frame.epoch = next_epoch;
                frame.indexes.clear();
                frame.indexes.extend_from_slice(&indexes);
                slot
            }
            None => {
                self.frames.push(Arc::new(Frame {
                    epoch: next_epoch,
                    indexes,
                }));
                tracing::debug!(
                    frames = self.frames.len(),
                    epoch = next_epoch,
                    "index set frame arena grew"
                );
                self.frames.len() - 1
            }
        };

        self.shared.current.store(Arc::clone(&self.frames[slot]));
        self.epoch = next_epoch;
    }

    /// The most recently published snapshot. Never blocks.
    pub fn valid_indexes(&self) -> ValidIndexes {
        ValidIndexes::new(self.shared.current.load_full())
    }

    /// A handle other threads use to read snapshots and items.
    pub fn reader(&self) -> IndexSetReader<T> {
        IndexSetReader {
            shared: Arc::clone(&self.shared),
        }
    }

    /// The item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity()`.
    pub fn get(&self, index: usize) -> &T {
        &self.shared.items[index]
    }

    /// Physical slot count, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.shared.items.len()
    }

    /// Logical size: one past the highest index ever allocated.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no index has ever been allocated.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Indices ready for immediate reuse.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Freed indices still waiting for readers to release older frames.
    pub fn pending_retirements(&self) -> usize {
        self.retired.len()
    }

    /// Number of frames in the arena. Grows only while readers hold
    /// snapshots across several publishes.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Epoch of the current publication; 0 before the first publish.
    pub fn current_epoch(&self) -> u64 {
        self.epoch
    }
}

impl<T> fmt::Debug for LockFreeIndexSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeIndexSet")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("epoch", &self.epoch)
            .field("frames", &self.frames.len())
            .field("free", &self.free.len())
            .field("retired", &self.retired.len())
            .finish()
    }
}

/// Read side of a [`LockFreeIndexSet`], usable from any thread.
pub struct IndexSetReader<T> {
    shared: Arc<Shared<T>>,
}

impl<T> IndexSetReader<T> {
    /// The most recently published snapshot. Never blocks.
    pub fn valid_indexes(&self) -> ValidIndexes {
        ValidIndexes::new(self.shared.current.load_full())
    }

    /// The item at `index`. Only indices in a held snapshot are safe to
    /// touch.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity()`.
    pub fn get(&self, index: usize) -> &T {
        &self.shared.items[index]
    }

    /// Physical slot count.
    pub fn capacity(&self) -> usize {
        self.shared.items.len()
    }
}

impl<T> Clone for IndexSetReader<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for IndexSetReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSetReader")
            .field("capacity", &self.capacity())
            .field("epoch", &self.shared.current.load().epoch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    fn set(capacity: usize) -> LockFreeIndexSet<AtomicU32> {
        LockFreeIndexSet::new(capacity)
    }

    #[test]
    fn new_set_publishes_empty_epoch_zero() {
        let s = set(4);
        let snap = s.valid_indexes();
        assert_eq!(snap.epoch(), 0);
        assert!(snap.is_empty());
        assert_eq!(s.capacity(), 4);
        assert!(s.is_empty());
        assert_eq!(s.frame_count(), 0);
    }

    #[test]
    fn allocation_is_invisible_until_valid_and_published() {
        let mut s = set(4);
        let i = s.allocate_item();
        assert_eq!(i, 0);
        s.update_indexes();
        assert!(s.valid_indexes().is_empty());

        s.make_item_valid(i);
        assert!(s.valid_indexes().is_empty(), "not published yet");
        s.update_indexes();
        assert_eq!(s.valid_indexes().as_slice(), &[0]);
    }

    #[test]
    fn make_item_valid_is_idempotent() {
        let mut s = set(4);
        let i = s.allocate_item();
        s.make_item_valid(i);
        s.make_item_valid(i);
        s.update_indexes();
        assert_eq!(s.valid_indexes().as_slice(), &[i]);
    }

    #[test]
    fn published_indexes_are_sorted() {
        let mut s = set(8);
        let ids: Vec<_> = (0..5).map(|_| s.allocate_item()).collect();
        for &i in ids.iter().rev() {
            s.make_item_valid(i);
        }
        s.free_item(2);
        s.update_indexes();
        assert_eq!(s.valid_indexes().as_slice(), &[0, 1, 3, 4]);
    }

    #[test]
    fn free_before_first_publish_is_immediate() {
        let mut s = set(2);
        let i = s.allocate_item();
        s.free_item(i);
        assert_eq!(s.free_count(), 1);
        assert_eq!(s.allocate_item(), i);
    }

    #[test]
    fn held_snapshot_blocks_reuse() {
        let mut s = set(4);
        let i0 = s.allocate_item();
        s.make_item_valid(i0);
        s.update_indexes();

        let held = s.reader().valid_indexes();
        assert_eq!(held.as_slice(), &[0]);

        s.free_item(i0);
        s.update_indexes();
        assert!(s.valid_indexes().is_empty());
        assert_eq!(held.as_slice(), &[0], "old snapshot stays consistent");

        assert_eq!(s.allocate_item(), 1, "index 0 must not be reused while held");

        drop(held);
        s.update_indexes();
        assert_eq!(s.allocate_item(), 0);
    }

    #[test]
    fn older_held_frame_also_blocks_reuse() {
        let mut s = set(4);
        let i = s.allocate_item();
        s.make_item_valid(i);
        s.update_indexes(); // epoch 1 = {0}
        let oldest = s.valid_indexes();

        s.update_indexes(); // epoch 2 = {0}
        s.free_item(i); // retired under epoch 2
        s.update_indexes(); // epoch 3 = {}
        s.update_indexes(); // epoch 2 released, epoch 1 still held

        assert_eq!(s.pending_retirements(), 1);
        assert_eq!(s.allocate_item(), 1);

        drop(oldest);
        s.update_indexes();
        assert_eq!(s.pending_retirements(), 0);
        assert_eq!(s.allocate_item(), 0);
    }

    #[test]
    fn frames_are_recycled_when_unreferenced() {
        let mut s = set(4);
        for _ in 0..10 {
            s.update_indexes();
        }
        assert!(s.frame_count() <= 2, "got {} frames", s.frame_count());
        assert_eq!(s.current_epoch(), 10);
    }

    #[test]
    fn frames_grow_while_snapshots_are_held() {
        let mut s = set(4);
        let mut held = Vec::new();
        for _ in 0..5 {
            s.update_indexes();
            held.push(s.valid_indexes());
        }
        assert_eq!(s.frame_count(), 5);
        held.clear();
        s.update_indexes();
        assert_eq!(s.frame_count(), 5, "arena keeps its frames for reuse");
    }

    #[test]
    fn try_allocate_reports_capacity() {
        let mut s = set(2);
        s.allocate_item();
        s.allocate_item();
        assert_eq!(
            s.try_allocate_item(),
            Err(CapacityError::IndexSetFull { capacity: 2 })
        );
    }

    #[test]
    #[should_panic(expected = "index set full")]
    fn allocate_beyond_capacity_panics() {
        let mut s = set(1);
        s.allocate_item();
        s.allocate_item();
    }

    #[test]
    #[should_panic(expected = "capacity must be >= 1")]
    fn zero_capacity_panics() {
        let _ = set(0);
    }

    #[test]
    #[should_panic(expected = "never allocated")]
    fn make_valid_unallocated_panics() {
        let mut s = set(4);
        s.make_item_valid(3);
    }

    #[test]
    #[should_panic(expected = "freed twice")]
    fn double_free_panics() {
        let mut s = set(4);
        let i = s.allocate_item();
        s.make_item_valid(i);
        s.update_indexes();
        s.free_item(i);
        s.free_item(i);
    }

    #[test]
    #[should_panic(expected = "freed twice")]
    fn double_free_before_first_publish_panics() {
        let mut s = set(4);
        let i = s.allocate_item();
        s.free_item(i);
        s.free_item(i);
    }

    #[test]
    #[should_panic(expected = "freed and not reallocated")]
    fn make_valid_after_free_panics() {
        let mut s = set(4);
        let i = s.allocate_item();
        s.free_item(i);
        s.make_item_valid(i);
    }

    #[test]
    fn reclaimed_index_is_handed_out_once() {
        let mut s = set(4);
        let i = s.allocate_item();
        s.make_item_valid(i);
        s.update_indexes();
        s.free_item(i);
        s.update_indexes();
        s.update_indexes();
        assert_eq!(s.free_count(), 1);

        let a = s.allocate_item();
        let b = s.allocate_item();
        assert_ne!(a, b, "same index handed out twice");
        s.free_item(a);
        s.free_item(b);
    }

    #[test]
    fn from_fn_initializes_items() {
        let s = LockFreeIndexSet::from_fn(3, |i| AtomicU32::new(i as u32 * 10));
        assert_eq!(s.get(2).load(Ordering::Relaxed), 20);
        assert_eq!(s.reader().get(1).load(Ordering::Relaxed), 10);
    }

    #[test]
    fn reader_thread_sees_published_items() {
        let mut s = set(8);
        let reader = s.reader();
        for value in 0..4u32 {
            let i = s.allocate_item();
            s.get(i).store(value + 100, Ordering::Release);
            s.make_item_valid(i);
        }
        s.update_indexes();

        let handle = thread::spawn(move || {
            let snap = reader.valid_indexes();
            snap.iter()
                .map(|&i| reader.get(i).load(Ordering::Acquire))
                .sum::<u32>()
        });
        assert_eq!(handle.join().unwrap(), 100 + 101 + 102 + 103);
    }

    #[test]
    fn concurrent_readers_during_churn() {
        let mut s = set(64);
        let reader = s.reader();
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let reader = reader.clone();
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    let mut snapshots = 0u64;
                    while !stop.load(Ordering::Acquire) {
                        let snap = reader.valid_indexes();
                        for &i in &snap {
                            // Live items always carry their own index + 1.
                            assert_eq!(reader.get(i).load(Ordering::Acquire), i as u32 + 1);
                        }
                        snapshots += 1;
                    }
                    snapshots
                })
            })
            .collect();

        let mut live = Vec::new();
        for tick in 0..500 {
            if tick % 3 == 0 && !live.is_empty() {
                let i = live.remove(0);
                s.free_item(i);
            }
            if let Ok(i) = s.try_allocate_item() {
                s.get(i).store(i as u32 + 1, Ordering::Release);
                s.make_item_valid(i);
                live.push(i);
            }
            s.update_indexes();
        }
        stop.store(true, Ordering::Release);
        for r in readers {
            assert!(r.join().unwrap() > 0);
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Allocate,
            MakeValid(usize),
            Free(usize),
            Update,
            Hold,
            Release(usize),
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                3 => Just(Op::Allocate),
                3 => any::<usize>().prop_map(Op::MakeValid),
                2 => any::<usize>().prop_map(Op::Free),
                3 => Just(Op::Update),
                1 => Just(Op::Hold),
                1 => any::<usize>().prop_map(Op::Release),
            ]
        }

        proptest! {
            #[test]
            fn held_indexes_never_reallocated(ops in proptest::collection::vec(arb_op(), 1..200)) {
                let mut s: LockFreeIndexSet<()> = LockFreeIndexSet::new(16);
                let mut owned: Vec<usize> = Vec::new();
                let mut held: Vec<ValidIndexes> = Vec::new();

                for op in ops {
                    match op {
                        Op::Allocate => {
                            if let Ok(i) = s.try_allocate_item() {
                                prop_assert!(!owned.contains(&i), "double allocation of {}", i);
                                for snap in &held {
                                    prop_assert!(
                                        !snap.contains(i),
                                        "index {} reused while epoch {} holds it", i, snap.epoch()
                                    );
                                }
                                owned.push(i);
                            }
                        }
                        Op::MakeValid(k) if !owned.is_empty() => {
                            s.make_item_valid(owned[k % owned.len()]);
                        }
                        Op::Free(k) if !owned.is_empty() => {
                            let i = owned.swap_remove(k % owned.len());
                            s.free_item(i);
                        }
                        Op::Update => s.update_indexes(),
                        Op::Hold => held.push(s.valid_indexes()),
                        Op::Release(k) if !held.is_empty() => {
                            held.swap_remove(k % held.len());
                        }
                        _ => {}
                    }
                }
            }

            #[test]
            fn repeated_make_valid_matches_single(
                count in 1usize..8,
                repeats in 1usize..5,
            ) {
                let mut once: LockFreeIndexSet<()> = LockFreeIndexSet::new(8);
                let mut many: LockFreeIndexSet<()> = LockFreeIndexSet::new(8);
                for _ in 0..count {
                    let a = once.allocate_item();
                    once.make_item_valid(a);
                    let b = many.allocate_item();
                    for _ in 0..repeats {
                        many.make_item_valid(b);
                    }
                }
                once.update_indexes();
                many.update_indexes();
                let (a, b) = (once.valid_indexes(), many.valid_indexes());
                prop_assert_eq!(a.as_slice(), b.as_slice());
            }
        }
    }
}
