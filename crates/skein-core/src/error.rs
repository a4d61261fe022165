//! Error types shared across the Skein crates.
//!
//! Two classes of failure are values rather than panics: construction
//! parameters that fail validation ([`ConfigError`]) and recoverable
//! capacity exhaustion ([`CapacityError`]). Protocol violations (double
//! resolution, dispatching onto a shut down queue) are panics and have
//! no error type.

use std::error::Error;
use std::fmt;

/// Errors detected while validating construction parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A dispatch queue was configured with no worker threads.
    ZeroThreads,
    /// A dispatch queue was configured with an empty name.
    EmptyName,
    /// An event queue capacity is below the minimum of 2.
    ///
    /// One slot is always kept free to tell a full ring from an empty one.
    QueueCapacityTooSmall {
        /// The configured capacity.
        configured: usize,
    },
    /// An event queue capacity does not fit the packed 32-bit cursor.
    QueueCapacityTooLarge {
        /// The configured capacity.
        configured: usize,
    },
    /// An event queue pool was configured to grow by zero queues.
    ZeroBlockSize,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroThreads => write!(f, "dispatch queue needs at least one thread"),
            Self::EmptyName => write!(f, "dispatch queue name must not be empty"),
            Self::QueueCapacityTooSmall { configured } => {
                write!(f, "event queue capacity must be >= 2, got {configured}")
            }
            Self::QueueCapacityTooLarge { configured } => {
                write!(f, "event queue capacity {configured} exceeds u32::MAX")
            }
            Self::ZeroBlockSize => write!(f, "event queue pool block size must be >= 1"),
        }
    }
}

impl Error for ConfigError {}

/// Recoverable capacity exhaustion.
///
/// Callers decide the policy; the usual one is to log and drop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapacityError {
    /// Every slot of an index set's backing array is allocated.
    IndexSetFull {
        /// Physical capacity of the set.
        capacity: usize,
    },
    /// An event queue has no free slot.
    QueueFull {
        /// Slot count of the queue's ring.
        capacity: usize,
    },
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexSetFull { capacity } => {
                write!(f, "index set full ({capacity} slots allocated)")
            }
            Self::QueueFull { capacity } => write!(f, "event queue full (capacity {capacity})"),
        }
    }
}

impl Error for CapacityError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            ConfigError::QueueCapacityTooSmall { configured: 1 }.to_string(),
            "event queue capacity must be >= 2, got 1"
        );
        assert_eq!(
            CapacityError::IndexSetFull { capacity: 8 }.to_string(),
            "index set full (8 slots allocated)"
        );
    }
}
