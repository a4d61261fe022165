//! Core types for the Skein cross-thread coordination core.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the single-assignment [`Deferred`] result cell every other Skein
//! component builds on, the [`Awaitable`] abstraction the dispatch queue
//! uses to gate work on its inputs, transaction identifiers, and the
//! shared error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod awaitable;
pub mod deferred;
pub mod error;
pub mod id;

pub use awaitable::{Awaitable, Dependencies, Resolved};
pub use deferred::Deferred;
pub use error::{CapacityError, ConfigError};
pub use id::{SourceId, TransactionClock, TransactionId};
