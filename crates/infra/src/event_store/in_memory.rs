use std::collections::HashMap;
use std::sync::RwLock;

use catalog_core::{AggregateId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    aggregate_type: String,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store.
///
/// Intended for tests and local runs. A single `RwLock` guards every stream,
/// so appends are serialized and the version check is atomic with the write.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events across all streams.
    pub fn len(&self) -> usize {
        self.streams
            .read()
            .map(|streams| streams.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };

        let key = StreamKey {
            aggregate_type: first.aggregate_type.clone(),
            aggregate_id: first.aggregate_id,
        };

        for (idx, e) in events.iter().enumerate() {
            if e.aggregate_id != key.aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != key.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch mixes '{}' and '{}' (index {idx})",
                    key.aggregate_type, e.aggregate_type
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let current = streams
            .get(&key)
            .map(|stream| Self::current_version(stream))
            .unwrap_or(0);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        let committed: Vec<StoredEvent> = events
            .into_iter()
            .zip(current + 1..)
            .map(|(e, sequence_number)| StoredEvent {
                event_id: e.event_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            })
            .collect();

        streams.entry(key).or_default().extend(committed.iter().cloned());
        Ok(committed)
    }

    fn load_stream(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            aggregate_type: aggregate_type.to_string(),
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn event(aggregate_id: AggregateId, aggregate_type: &str, n: u128) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::from_u128(n),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.bumped".to_string(),
            event_version: 1,
            occurred_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            payload: json!({ "n": n }),
        }
    }

    #[test]
    fn append_assigns_contiguous_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        let first = store
            .append(vec![event(id, "t", 1), event(id, "t", 2)], ExpectedVersion::Exact(0))
            .unwrap();
        let second = store
            .append(vec![event(id, "t", 3)], ExpectedVersion::Exact(2))
            .unwrap();

        let seqs: Vec<u64> = first.iter().chain(&second).map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(store.load_stream("t", id).unwrap().len(), 3);
    }

    #[test]
    fn stale_expected_version_is_rejected_without_writing() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append(vec![event(id, "t", 1)], ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .append(vec![event(id, "t", 2)], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rejected_append_to_unknown_stream_creates_no_stream() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        let err = store
            .append(vec![event(id, "t", 1)], ExpectedVersion::Exact(3))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert!(store.streams.read().unwrap().is_empty());

        store
            .append(vec![event(id, "t", 1)], ExpectedVersion::Exact(0))
            .unwrap();
        assert_eq!(store.streams.read().unwrap().len(), 1);
    }

    #[test]
    fn streams_are_keyed_by_type_and_id() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append(vec![event(id, "a", 1)], ExpectedVersion::Exact(0))
            .unwrap();
        store
            .append(vec![event(id, "b", 2)], ExpectedVersion::Exact(0))
            .unwrap();

        assert_eq!(store.load_stream("a", id).unwrap().len(), 1);
        assert_eq!(store.load_stream("b", id).unwrap().len(), 1);
        assert!(store.load_stream("c", id).unwrap().is_empty());
    }

    #[test]
    fn mixed_batches_are_rejected() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        let err = store
            .append(vec![event(id, "a", 1), event(id, "b", 2)], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));

        let err = store
            .append(
                vec![event(id, "a", 1), event(AggregateId::new(), "a", 2)],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let store = InMemoryEventStore::new();
        assert!(store.append(vec![], ExpectedVersion::Exact(7)).unwrap().is_empty());
    }
}
