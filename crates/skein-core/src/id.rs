//! Strongly-typed identifiers and the transaction clock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies the transaction that produced an event.
///
/// `TransactionId(0)` is reserved: an event stamped with it is visible to
/// every consumer, and a consumer polling with it sees every event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// The reserved "always visible" identifier.
    pub const NONE: TransactionId = TransactionId(0);

    /// Whether this is the reserved identifier.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Whether an event stamped with `self` is hidden from a consumer
    /// polling as `viewer`.
    ///
    /// An event raised during transaction T must not be seen by T itself
    /// or by any transaction that started before it committed.
    pub fn hidden_from(self, viewer: TransactionId) -> bool {
        !self.is_none() && !viewer.is_none() && self >= viewer
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TransactionId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies the entity or subsystem that emitted an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SourceId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Monotonic source of [`TransactionId`]s.
///
/// The first issued id is 1; id 0 is never issued. Never wraps in
/// practice (u64 overflow at a million transactions per second would take
/// ~585,000 years).
pub struct TransactionClock {
    last: AtomicU64,
}

impl Default for TransactionClock {
    fn default() -> Self {
        Self::new()
    }
}

// Compile-time assertion: TransactionClock must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<TransactionClock>();
};

impl TransactionClock {
    /// Create a clock that has issued nothing yet.
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Issue the next transaction id. Thread-safe.
    pub fn next_id(&self) -> TransactionId {
        TransactionId(self.last.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// The most recently issued id, or [`TransactionId::NONE`].
    pub fn last_issued(&self) -> TransactionId {
        TransactionId(self.last.load(Ordering::Acquire))
    }
}

impl fmt::Debug for TransactionClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionClock")
            .field("last", &self.last_issued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn clock_starts_at_one() {
        let clock = TransactionClock::new();
        assert_eq!(clock.last_issued(), TransactionId::NONE);
        assert_eq!(clock.next_id(), TransactionId(1));
        assert_eq!(clock.next_id(), TransactionId(2));
        assert_eq!(clock.last_issued(), TransactionId(2));
    }

    #[test]
    fn clock_ids_unique_across_threads() {
        let clock = Arc::new(TransactionClock::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || (0..250).map(|_| clock.next_id().0).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
        assert_eq!(all.first(), Some(&1));
        assert_eq!(all.last(), Some(&1000));
    }

    #[test]
    fn visibility_gate() {
        let t5 = TransactionId(5);
        // Hidden from the producing transaction and from older viewers.
        assert!(t5.hidden_from(TransactionId(5)));
        assert!(t5.hidden_from(TransactionId(3)));
        // Visible to later transactions.
        assert!(!t5.hidden_from(TransactionId(6)));
        // Untagged events and untagged viewers are never gated.
        assert!(!TransactionId::NONE.hidden_from(TransactionId(1)));
        assert!(!t5.hidden_from(TransactionId::NONE));
    }
}
