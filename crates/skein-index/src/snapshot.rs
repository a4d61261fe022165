//! Immutable published frames and the snapshot handle readers hold.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// One published list of valid indices.
///
/// Frames are immutable while any reader can see them. The owner reuses a
/// frame's allocation only after every [`ValidIndexes`] handle to it has
/// been dropped.
#[derive(Debug, Default)]
pub(crate) struct Frame {
    pub(crate) epoch: u64,
    pub(crate) indexes: Vec<usize>,
}

/// A reader's view of one published frame.
///
/// Holding this keeps the frame's indices from being reused, so readers
/// should drop it promptly (typically at the end of one callback or tick).
/// A snapshot that is never released pins its frame forever.
#[derive(Clone)]
pub struct ValidIndexes {
    frame: Arc<Frame>,
}

impl ValidIndexes {
    pub(crate) fn new(frame: Arc<Frame>) -> Self {
        Self { frame }
    }

    /// The publication epoch of this frame. Epoch 0 is the empty frame
    /// that exists before the first publish.
    pub fn epoch(&self) -> u64 {
        self.frame.epoch
    }

    /// The valid indices, in ascending order.
    pub fn as_slice(&self) -> &[usize] {
        &self.frame.indexes
    }

    /// Whether `index` is valid in this frame.
    pub fn contains(&self, index: usize) -> bool {
        self.frame.indexes.binary_search(&index).is_ok()
    }
}

impl Deref for ValidIndexes {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.frame.indexes
    }
}

impl<'a> IntoIterator for &'a ValidIndexes {
    type Item = &'a usize;
    type IntoIter = std::slice::Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.frame.indexes.iter()
    }
}

impl fmt::Debug for ValidIndexes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidIndexes")
            .field("epoch", &self.frame.epoch)
            .field("indexes", &self.frame.indexes)
            .finish()
    }
}
