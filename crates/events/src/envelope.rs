use serde::{Deserialize, Serialize};
use uuid::Uuid;

use catalog_core::AggregateId;

/// Envelope for an event, containing stream metadata.
///
/// This is the unit a persistence layer hands back when a stream is read.
///
/// Notes:
/// - **Append-only**: `sequence_number` is monotonically increasing per stream
///   and equals the aggregate version right after the event is applied.
/// - `payload` is the typed domain event (or raw JSON before decoding).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,

    aggregate_id: AggregateId,
    aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Transform the payload, keeping the stream metadata.
    pub fn try_map<F, T, Err>(self, f: F) -> Result<EventEnvelope<T>, Err>
    where
        F: FnOnce(E) -> Result<T, Err>,
    {
        Ok(EventEnvelope {
            event_id: self.event_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            sequence_number: self.sequence_number,
            payload: f(self.payload)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_map_keeps_metadata() {
        let id = AggregateId::new();
        let env = EventEnvelope::new(Uuid::nil(), id, "catalog.stock", 4, "7".to_string());
        let mapped = env.try_map(|s| s.parse::<i64>()).unwrap();

        assert_eq!(mapped.aggregate_id(), id);
        assert_eq!(mapped.aggregate_type(), "catalog.stock");
        assert_eq!(mapped.sequence_number(), 4);
        assert_eq!(*mapped.payload(), 7);
    }

    #[test]
    fn try_map_propagates_errors() {
        let env = EventEnvelope::new(Uuid::nil(), AggregateId::new(), "x", 1, "nope".to_string());
        assert!(env.try_map(|s| s.parse::<i64>()).is_err());
    }
}
