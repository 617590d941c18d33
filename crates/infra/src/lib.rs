//! Infrastructure layer: event store, aggregate repository and configuration.

pub mod config;
pub mod event_store;
pub mod repository;


pub use config::RepositoryConfig;
pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent,
};
pub use repository::{AggregateRepository, RepositoryError};
