use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::journal::{Journal, JournalError};
use crate::event_sourcing::core::event::EventMetadata;
use crate::event_sourcing::core::{Aggregate, EventEnvelope};

// ============================================================================
// In-Memory Journal
// ============================================================================
//
// Reference journal implementation backing tests and the demo binary.
// Rows hold the event payload serialized to JSON next to its metadata
// columns, the same row shape a database-backed journal would persist.
// Conflict detection is a compare-and-swap on the stream's last sequence
// number.
//
// ============================================================================

#[derive(Debug, Clone)]
struct StoredEvent {
    sequence_number: u64,
    event_id: Uuid,
    event_name: String,
    event_version: i32,
    payload: String,
    timestamp: DateTime<Utc>,
}

pub struct InMemoryJournal<A: Aggregate> {
    streams: RwLock<HashMap<A::Id, Vec<StoredEvent>>>,
}

impl<A: Aggregate> InMemoryJournal<A> {
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Number of events persisted for one identity.
    pub async fn stream_len(&self, aggregate_id: &A::Id) -> usize {
        let streams = self.streams.read().await;
        streams.get(aggregate_id).map_or(0, Vec::len)
    }
}

impl<A: Aggregate> Default for InMemoryJournal<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<A: Aggregate> Journal<A> for InMemoryJournal<A> {
    async fn append(
        &self,
        aggregate_id: &A::Id,
        envelopes: &[EventEnvelope<A>],
        expected_sequence: u64,
    ) -> Result<u64, JournalError> {
        if envelopes.is_empty() {
            return Err(JournalError::Storage(
                "cannot append an empty event batch".to_string(),
            ));
        }

        let mut streams = self.streams.write().await;
        let stream = streams.entry(aggregate_id.clone()).or_default();

        let actual = stream.last().map_or(0, |row| row.sequence_number);
        if actual != expected_sequence {
            return Err(JournalError::Conflict {
                expected: expected_sequence,
                actual,
            });
        }

        // Serialize the whole batch before touching the stream so a bad
        // payload cannot leave a partial append behind.
        let mut rows = Vec::with_capacity(envelopes.len());
        let mut next = expected_sequence;
        for envelope in envelopes {
            next += 1;
            if envelope.sequence_number != next {
                return Err(JournalError::Storage(format!(
                    "non-contiguous batch: envelope carries sequence {}, stream expects {}",
                    envelope.sequence_number, next
                )));
            }
            let payload = serde_json::to_string(&envelope.event)
                .map_err(|e| JournalError::Storage(e.to_string()))?;
            rows.push(StoredEvent {
                sequence_number: envelope.sequence_number,
                event_id: envelope.metadata.event_id,
                event_name: envelope.metadata.event_name.clone(),
                event_version: envelope.metadata.event_version,
                payload,
                timestamp: envelope.metadata.timestamp,
            });
        }
        stream.extend(rows);

        tracing::debug!(
            aggregate_type = A::AGGREGATE_TYPE,
            aggregate_id = %aggregate_id,
            new_sequence = next,
            event_count = envelopes.len(),
            "appended events to journal"
        );

        Ok(next)
    }

    async fn read(&self, aggregate_id: &A::Id) -> Result<Vec<EventEnvelope<A>>, JournalError> {
        self.read_from(aggregate_id, 0).await
    }

    async fn read_from(
        &self,
        aggregate_id: &A::Id,
        from_sequence: u64,
    ) -> Result<Vec<EventEnvelope<A>>, JournalError> {
        let streams = self.streams.read().await;
        let Some(stream) = streams.get(aggregate_id) else {
            return Ok(Vec::new());
        };

        let mut envelopes = Vec::new();
        for row in stream {
            if row.sequence_number <= from_sequence {
                continue;
            }
            let event: A::Event = serde_json::from_str(&row.payload)
                .map_err(|e| JournalError::Storage(e.to_string()))?;
            envelopes.push(EventEnvelope {
                aggregate_type: A::AGGREGATE_TYPE.to_string(),
                aggregate_id: aggregate_id.clone(),
                sequence_number: row.sequence_number,
                event,
                metadata: EventMetadata {
                    event_id: row.event_id,
                    event_name: row.event_name.clone(),
                    event_version: row.event_version,
                    aggregate_id: aggregate_id.to_string(),
                    sequence_number: row.sequence_number,
                    timestamp: row.timestamp,
                    extra: HashMap::new(),
                },
            });
        }
        Ok(envelopes)
    }
}
