//! Event and its asynchronously-resolved form.

use skein_core::{Deferred, SourceId, TransactionId};

/// A resolved event as delivered to a consumer.
#[derive(Clone, Debug, PartialEq)]
pub struct Event<P> {
    /// Binding name the event was raised under.
    pub name: String,
    /// Entity or subsystem that raised it.
    pub source: SourceId,
    /// Event data.
    pub payload: P,
}

impl<P> Event<P> {
    /// Create an event.
    pub fn new(name: impl Into<String>, source: SourceId, payload: P) -> Self {
        Self {
            name: name.into(),
            source,
            payload,
        }
    }
}

/// An event as stored in a queue.
///
/// The payload is a [`Deferred`] so it can be computed off the producer
/// thread. Resolving it to `None` filters the event out: the consumer
/// skips it without output.
#[derive(Clone, Debug)]
pub struct AsyncEvent<P> {
    /// Binding name the event was raised under.
    pub name: String,
    /// Entity or subsystem that raised it.
    pub source: SourceId,
    /// Payload cell; `None` once resolved means "dropped".
    pub payload: Deferred<Option<P>>,
    /// Transaction that raised the event, or [`TransactionId::NONE`].
    pub transaction: TransactionId,
}

impl<P> AsyncEvent<P> {
    /// Wrap an already-resolved event.
    pub fn from_event(event: Event<P>, transaction: TransactionId) -> Self {
        Self {
            name: event.name,
            source: event.source,
            payload: Deferred::resolved(Some(event.payload)),
            transaction,
        }
    }

    /// An event whose payload is resolved later through `payload`.
    pub fn deferred(
        name: impl Into<String>,
        source: SourceId,
        payload: Deferred<Option<P>>,
        transaction: TransactionId,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            payload,
            transaction,
        }
    }

    /// Whether the payload has been resolved (with a value or filtered).
    pub fn is_ready(&self) -> bool {
        self.payload.is_ready()
    }
}
