use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::Aggregate;

// ============================================================================
// Domain Event Envelope
// ============================================================================
//
// Wraps a raw domain event with the identity it belongs to, its aggregate
// sequence number, and event metadata. Envelopes are built only after the
// journal append for the event has succeeded, and are immutable afterwards.
//
// The envelope for the Nth event ever applied to an identity carries
// sequence number N.
//
// ============================================================================

/// Generic domain event trait.
///
/// Events are facts that have already happened; they carry a stable name
/// and schema version per variant so subscribers and stores can dispatch
/// without deserializing the payload.
pub trait DomainEvent:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Stable name of this event variant, e.g. `"CartItemAdded"`.
    fn event_name(&self) -> &'static str;

    /// Schema version of this event variant.
    fn event_version(&self) -> i32 {
        1
    }
}

/// Metadata attached to every published envelope.
///
/// At minimum the identity value and sequence number; the `extra` map is
/// open for cross-cutting additions (correlation ids, trace context).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: Uuid,
    pub event_name: String,
    pub event_version: i32,
    pub aggregate_id: String,
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

/// Envelope around one persisted domain event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "A: Aggregate", deserialize = "A: Aggregate"))]
pub struct EventEnvelope<A: Aggregate> {
    pub aggregate_type: String,
    pub aggregate_id: A::Id,
    pub sequence_number: u64,
    pub event: A::Event,
    pub metadata: EventMetadata,
}

impl<A: Aggregate> EventEnvelope<A> {
    pub fn new(aggregate_id: A::Id, sequence_number: u64, event: A::Event) -> Self {
        let metadata = EventMetadata {
            event_id: Uuid::new_v4(),
            event_name: event.event_name().to_string(),
            event_version: event.event_version(),
            aggregate_id: aggregate_id.to_string(),
            sequence_number,
            timestamp: Utc::now(),
            extra: HashMap::new(),
        };
        Self {
            aggregate_type: A::AGGREGATE_TYPE.to_string(),
            aggregate_id,
            sequence_number,
            event,
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.extra.insert(key.into(), value.into());
        self
    }
}
