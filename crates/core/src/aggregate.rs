//! Event-sourced aggregate engine.
//!
//! An aggregate is a deterministic reducer over its ordered event stream:
//!
//! - **Decision logic** lives in named business methods. They validate first
//!   and only then call [`Aggregate::raise`].
//! - **State mutation** lives in [`Aggregate::apply`], a total function over the
//!   aggregate's closed event enum.
//! - **Replay** goes through [`Aggregate::load_from_history`], which applies
//!   persisted events without validation and without buffering them.
//!
//! Aggregates must not perform IO or read the clock; callers pass `now`.

use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Number of events applied since creation (raised or replayed).
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (migrations, imports).
    Any,
    /// Require the stream to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Version counter plus the buffer of events raised since the last commit.
///
/// Embedded in every aggregate. Only the provided methods of [`Aggregate`]
/// touch it, so `version` always equals the number of applied events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecorder<E> {
    version: u64,
    uncommitted: Vec<E>,
}

impl<E> Default for EventRecorder<E> {
    fn default() -> Self {
        Self {
            version: 0,
            uncommitted: Vec::new(),
        }
    }
}

impl<E> EventRecorder<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn uncommitted(&self) -> &[E] {
        &self.uncommitted
    }

    /// Nothing applied yet: the only state in which replay is allowed.
    pub fn is_pristine(&self) -> bool {
        self.version == 0 && self.uncommitted.is_empty()
    }

    fn record(&mut self, event: E) {
        self.uncommitted.push(event);
        self.version += 1;
    }

    fn advance(&mut self) {
        self.version += 1;
    }

    fn clear(&mut self) {
        self.uncommitted.clear();
    }
}

/// Event-sourced aggregate contract.
pub trait Aggregate: AggregateRoot + Sized {
    /// Closed set of events this aggregate produces and consumes.
    type Event: Clone + core::fmt::Debug;

    /// Stable stream type name (e.g. "catalog.product").
    const AGGREGATE_TYPE: &'static str;

    /// Create an empty, not-yet-created instance for rehydration.
    fn empty(id: Self::Id) -> Self;

    /// Evolve in-memory state from a single event.
    ///
    /// Must be total and deterministic. Never validates and never touches the
    /// version counter; the provided methods do that.
    fn apply(&mut self, event: &Self::Event);

    /// Reject a persisted event the current state cannot absorb.
    ///
    /// Runs before each `apply` during replay. Accepts everything by default.
    fn check_replay(&self, _event: &Self::Event) -> DomainResult<()> {
        Ok(())
    }

    fn recorder(&self) -> &EventRecorder<Self::Event>;

    fn recorder_mut(&mut self) -> &mut EventRecorder<Self::Event>;

    /// Record a freshly decided event and apply it.
    ///
    /// Never fails. Callers validate before raising.
    fn raise(&mut self, event: Self::Event) {
        self.apply(&event);
        self.recorder_mut().record(event);
    }

    /// Rebuild state from a persisted stream.
    ///
    /// Events are applied in order, one version each, and are not added to the
    /// uncommitted buffer. Only valid on a pristine instance. An event refused
    /// by [`Aggregate::check_replay`] stops the replay and leaves the instance
    /// partially rebuilt, so callers discard it.
    fn load_from_history<I>(&mut self, events: I) -> DomainResult<()>
    where
        I: IntoIterator<Item = Self::Event>,
    {
        if !self.recorder().is_pristine() {
            return Err(DomainError::replay(format!(
                "{} {:?} already at version {} with {} uncommitted events",
                Self::AGGREGATE_TYPE,
                self.id(),
                self.recorder().version(),
                self.recorder().uncommitted().len()
            )));
        }
        for event in events {
            self.check_replay(&event)?;
            self.apply(&event);
            self.recorder_mut().advance();
        }
        Ok(())
    }

    /// `empty(id)` followed by `load_from_history(events)`.
    fn from_history<I>(id: Self::Id, events: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = Self::Event>,
    {
        let mut aggregate = Self::empty(id);
        aggregate.load_from_history(events)?;
        Ok(aggregate)
    }

    /// Events raised since load, oldest first.
    fn domain_events(&self) -> &[Self::Event] {
        self.recorder().uncommitted()
    }

    /// Drop the uncommitted buffer. Call only after a successful commit.
    fn clear_domain_events(&mut self) {
        self.recorder_mut().clear();
    }

    /// Version of the persisted stream this instance was loaded from.
    fn committed_version(&self) -> u64 {
        let recorder = self.recorder();
        recorder.version() - recorder.uncommitted().len() as u64
    }

    /// Expectation to attach to the next append of `domain_events()`.
    fn expected_version(&self) -> ExpectedVersion {
        ExpectedVersion::Exact(self.committed_version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum CounterEvent {
        Opened { start: i64 },
        Bumped { by: i64 },
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Counter {
        id: u32,
        value: i64,
        recorder: EventRecorder<CounterEvent>,
    }

    impl AggregateRoot for Counter {
        type Id = u32;

        fn id(&self) -> &u32 {
            &self.id
        }

        fn version(&self) -> u64 {
            self.recorder.version()
        }
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;
        const AGGREGATE_TYPE: &'static str = "test.counter";

        fn empty(id: u32) -> Self {
            Self {
                id,
                value: 0,
                recorder: EventRecorder::new(),
            }
        }

        fn apply(&mut self, event: &CounterEvent) {
            match event {
                CounterEvent::Opened { start } => self.value = *start,
                CounterEvent::Bumped { by } => self.value += by,
            }
        }

        fn recorder(&self) -> &EventRecorder<CounterEvent> {
            &self.recorder
        }

        fn recorder_mut(&mut self) -> &mut EventRecorder<CounterEvent> {
            &mut self.recorder
        }
    }

    fn history() -> Vec<CounterEvent> {
        vec![
            CounterEvent::Opened { start: 10 },
            CounterEvent::Bumped { by: 5 },
            CounterEvent::Bumped { by: -2 },
        ]
    }

    #[test]
    fn raise_buffers_applies_and_bumps_version() {
        let mut c = Counter::empty(1);
        c.raise(CounterEvent::Opened { start: 1 });
        c.raise(CounterEvent::Bumped { by: 2 });

        assert_eq!(c.value, 3);
        assert_eq!(c.version(), 2);
        assert_eq!(c.domain_events().len(), 2);
        assert_eq!(c.committed_version(), 0);
    }

    #[test]
    fn replay_does_not_buffer_events() {
        let c = Counter::from_history(1, history()).unwrap();
        assert_eq!(c.value, 13);
        assert_eq!(c.version(), 3);
        assert!(c.domain_events().is_empty());
        assert_eq!(c.expected_version(), ExpectedVersion::Exact(3));
    }

    #[test]
    fn aggregates_with_eq_events_can_derive_eq() {
        fn assert_eq_impl<T: Eq>() {}
        assert_eq_impl::<EventRecorder<CounterEvent>>();
        assert_eq_impl::<Counter>();

        let a = Counter::from_history(1, history()).unwrap();
        let mut b = a.clone();
        assert_eq!(a, b);
        b.raise(CounterEvent::Bumped { by: 0 });
        assert_ne!(a, b);
    }

    #[test]
    fn replay_is_deterministic() {
        let a = Counter::from_history(7, history()).unwrap();
        let b = Counter::from_history(7, history()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn replay_on_mutated_aggregate_is_rejected() {
        let mut c = Counter::empty(1);
        c.raise(CounterEvent::Opened { start: 0 });
        let err = c.load_from_history(history()).unwrap_err();
        assert!(matches!(err, DomainError::Replay(_)));
        assert_eq!(c.version(), 1);

        let mut replayed = Counter::from_history(1, history()).unwrap();
        assert!(replayed.load_from_history(history()).is_err());
    }

    #[test]
    fn clear_keeps_version() {
        let mut c = Counter::from_history(1, history()).unwrap();
        c.raise(CounterEvent::Bumped { by: 1 });
        assert_eq!(c.committed_version(), 3);

        c.clear_domain_events();
        assert!(c.domain_events().is_empty());
        assert_eq!(c.version(), 4);
        assert_eq!(c.committed_version(), 4);
    }

    #[test]
    fn expected_version_check() {
        assert!(ExpectedVersion::Any.check(42).is_ok());
        assert!(ExpectedVersion::Exact(3).check(3).is_ok());
        let err = ExpectedVersion::Exact(3).check(4).unwrap_err();
        assert!(err.is_retryable());
    }
}
