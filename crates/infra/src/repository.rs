//! Load/commit cycle for event-sourced aggregates.
//!
//! ```text
//! load_stream(type, id) -> decode payloads -> A::from_history
//!   -> business method (raise) -> append(domain_events, Exact(committed_version))
//!   -> clear_domain_events
//! ```
//!
//! The repository owns no aggregate state. Every unit of work loads a fresh
//! instance, and concurrent writers are arbitrated by the store's version
//! check.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use catalog_core::{Aggregate, AggregateId, DomainError, DomainResult, IdGenerator, UuidV7Generator};
use catalog_events::Event;

use crate::config::RepositoryConfig;
use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A business method rejected the operation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] EventStoreError),

    /// The persisted stream could not be turned back into an aggregate.
    #[error("replay failed: {0}")]
    Replay(String),

    #[error("{aggregate_type} {id} not found")]
    NotFound {
        aggregate_type: &'static str,
        id: AggregateId,
    },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl RepositoryError {
    /// Optimistic concurrency conflict; reloading and retrying may succeed.
    pub fn is_conflict(&self) -> bool {
        match self {
            RepositoryError::Store(EventStoreError::Concurrency(_)) => true,
            RepositoryError::Domain(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Repository over any [`EventStore`].
///
/// `G` supplies event ids; tests plug in a deterministic generator.
#[derive(Debug)]
pub struct AggregateRepository<S, G = UuidV7Generator> {
    store: S,
    ids: G,
    config: RepositoryConfig,
}

impl<S: EventStore> AggregateRepository<S> {
    pub fn new(store: S) -> Self {
        Self::with_id_generator(store, UuidV7Generator)
    }
}

impl<S, G> AggregateRepository<S, G>
where
    S: EventStore,
    G: IdGenerator,
{
    pub fn with_id_generator(store: S, ids: G) -> Self {
        Self {
            store,
            ids,
            config: RepositoryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuild an aggregate from its stream.
    ///
    /// An empty stream is `NotFound`. Events with an unknown type tag or a
    /// malformed payload, and streams with gaps, are `Replay` errors.
    #[instrument(skip_all, fields(aggregate_type = A::AGGREGATE_TYPE), err(level = "debug"))]
    pub fn load<A>(&self, id: A::Id) -> Result<A, RepositoryError>
    where
        A: Aggregate,
        A::Id: Copy + Into<AggregateId>,
        A::Event: DeserializeOwned,
    {
        let aggregate_id: AggregateId = id.into();
        let stream = self.store.load_stream(A::AGGREGATE_TYPE, aggregate_id)?;
        if stream.is_empty() {
            return Err(RepositoryError::NotFound {
                aggregate_type: A::AGGREGATE_TYPE,
                id: aggregate_id,
            });
        }

        let events = decode_stream::<A>(&stream)?;
        let aggregate = A::from_history(id, events)
            .map_err(|e| RepositoryError::Replay(e.to_string()))?;

        debug!(%aggregate_id, version = aggregate.version(), "aggregate loaded");
        Ok(aggregate)
    }

    /// Append the aggregate's uncommitted events.
    ///
    /// The append expects the stream to still be at the version the aggregate
    /// was loaded at. The buffer is cleared only when the append succeeds, so a
    /// failed commit leaves the aggregate untouched.
    #[instrument(skip_all, fields(aggregate_type = A::AGGREGATE_TYPE), err(level = "debug"))]
    pub fn commit<A>(&self, aggregate: &mut A) -> Result<Vec<StoredEvent>, RepositoryError>
    where
        A: Aggregate,
        A::Id: Copy + Into<AggregateId>,
        A::Event: Event + Serialize,
    {
        let aggregate_id: AggregateId = (*aggregate.id()).into();
        if aggregate.domain_events().is_empty() {
            debug!(%aggregate_id, "nothing to commit");
            return Ok(vec![]);
        }

        let uncommitted = aggregate
            .domain_events()
            .iter()
            .map(|event| {
                UncommittedEvent::from_typed(
                    aggregate_id,
                    A::AGGREGATE_TYPE,
                    self.ids.next_uuid(),
                    event,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let expected = aggregate.expected_version();
        let committed = match self.store.append(uncommitted, expected) {
            Ok(committed) => committed,
            Err(EventStoreError::Concurrency(msg)) => {
                warn!(%aggregate_id, ?expected, reason = %msg, "commit rejected by version check");
                return Err(EventStoreError::Concurrency(msg).into());
            }
            Err(err) => return Err(err.into()),
        };

        aggregate.clear_domain_events();
        debug!(
            %aggregate_id,
            events = committed.len(),
            version = aggregate.version(),
            "aggregate committed"
        );
        Ok(committed)
    }

    /// Load, run one business method and commit, retrying on conflicts.
    ///
    /// Each attempt starts from a freshly loaded aggregate, so `decide` must be
    /// safe to run more than once. Domain errors are returned immediately.
    #[instrument(skip_all, fields(aggregate_type = A::AGGREGATE_TYPE), err(level = "debug"))]
    pub fn execute<A, F>(&self, id: A::Id, mut decide: F) -> Result<A, RepositoryError>
    where
        A: Aggregate,
        A::Id: Copy + Into<AggregateId>,
        A::Event: Event + Serialize + DeserializeOwned,
        F: FnMut(&mut A) -> DomainResult<()>,
    {
        let attempts = self.config.max_retries.saturating_add(1);
        let mut last = String::new();

        for attempt in 1..=attempts {
            let mut aggregate = self.load::<A>(id)?;
            decide(&mut aggregate)?;

            match self.commit(&mut aggregate) {
                Ok(_) => return Ok(aggregate),
                Err(err) if err.is_conflict() => {
                    debug!(attempt, attempts, "conflict, reloading");
                    last = err.to_string();
                }
                Err(err) => return Err(err),
            }
        }

        Err(RepositoryError::RetriesExhausted { attempts, last })
    }
}

fn decode_stream<A>(stream: &[StoredEvent]) -> Result<Vec<A::Event>, RepositoryError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    stream
        .iter()
        .enumerate()
        .map(|(idx, stored)| {
            let expected_seq = idx as u64 + 1;
            if stored.sequence_number != expected_seq {
                return Err(RepositoryError::Replay(format!(
                    "{} {}: expected sequence_number {expected_seq}, found {}",
                    A::AGGREGATE_TYPE,
                    stored.aggregate_id,
                    stored.sequence_number
                )));
            }
            if stored.aggregate_type != A::AGGREGATE_TYPE {
                return Err(RepositoryError::Replay(format!(
                    "stream of '{}' contains a '{}' event at #{expected_seq}",
                    A::AGGREGATE_TYPE,
                    stored.aggregate_type
                )));
            }
            stored
                .decode::<A::Event>()
                .map(|envelope| envelope.into_payload())
                .map_err(|e| RepositoryError::Replay(e.to_string()))
        })
        .collect()
}
