//! Double-buffered, single-writer index set with epoch-gated slot reuse.
//!
//! A [`LockFreeIndexSet`] owns a fixed-capacity array of items and lets
//! its owner thread publish "which slots are safe to touch right now" to
//! any number of reader threads, which hold [`ValidIndexes`] snapshots.
//!
//! # Architecture
//!
//! ```text
//! LockFreeIndexSet (owner thread, &mut self)
//! ├── free pool + pending-valid set + retirement queue
//! ├── frame arena: Vec<Arc<Frame>> (reused once unreferenced)
//! └── Arc<Shared>
//!     ├── items: Box<[T]>          (fixed, never resized)
//!     └── current: ArcSwap<Frame>  (latest published snapshot)
//!
//! IndexSetReader (any thread, Clone) ──► Arc<Shared>
//! ```
//!
//! Each published frame carries a monotonically increasing epoch. An index
//! freed while epoch `e` is current is handed back to the free pool only
//! once no frame with epoch `<= e` is still held by a reader.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod set;
pub mod snapshot;

pub use set::{IndexSetReader, LockFreeIndexSet};
pub use snapshot::ValidIndexes;
