//! Core aggregate and domain event traits.

use serde::{Serialize, de::DeserializeOwned};
use storage::Version;

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This is used for routing, logging, and the published payload.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates persisted as state snapshots.
///
/// An aggregate is a cluster of domain objects that can be treated as a single unit.
/// The aggregate root ensures consistency of changes being made within the aggregate.
///
/// Mutations happen through the aggregate's own methods, which record events
/// as a side channel. The events are transient: the unit of work drains them
/// after a successful commit and they are never persisted.
pub trait Aggregate: Serialize + DeserializeOwned + Send + Sync + Sized {
    /// The type of events this aggregate records.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the current version of the aggregate.
    ///
    /// The version is the optimistic-concurrency token stored alongside the state.
    fn version(&self) -> Version;

    /// Returns the events recorded since the last drain.
    fn pending_events(&self) -> &[Self::Event];

    /// Drains the recorded events in the order they were raised.
    fn take_events(&mut self) -> Vec<Self::Event>;

    /// Returns true if events are waiting to be drained.
    fn has_pending_events(&self) -> bool {
        !self.pending_events().is_empty()
    }
}
