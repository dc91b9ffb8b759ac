use async_trait::async_trait;

use crate::event_sourcing::core::{Aggregate, EventEnvelope};

// ============================================================================
// Journal - Append/Read Contract for Persisted Events
// ============================================================================
//
// The journal is a shared, append-only, per-identity-ordered resource.
// Appends for one identity carry the expected prior sequence number; a
// mismatch means another writer advanced the stream and the in-flight
// command must fail (the single-writer invariant was violated).
//
// The journal itself does not enforce single-writer access - the aggregate
// manager does, by keeping at most one live instance per identity.
//
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum JournalError {
    #[error("concurrency conflict: expected sequence {expected}, stream is at {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Persistence contract the aggregate engine requires of its backing store.
#[async_trait]
pub trait Journal<A: Aggregate>: Send + Sync {
    /// Append an ordered batch of envelopes for one identity.
    ///
    /// `expected_sequence` is the sequence number of the last event already
    /// in the stream (0 for a brand-new identity). Returns the stream's new
    /// last sequence number on success.
    async fn append(
        &self,
        aggregate_id: &A::Id,
        envelopes: &[EventEnvelope<A>],
        expected_sequence: u64,
    ) -> Result<u64, JournalError>;

    /// Read the full history for one identity in ascending sequence order.
    async fn read(&self, aggregate_id: &A::Id) -> Result<Vec<EventEnvelope<A>>, JournalError>;

    /// Read history strictly after `from_sequence`, ascending.
    ///
    /// Lagged subscribers use this to catch up, with the sequence number
    /// as the dedupe key.
    async fn read_from(
        &self,
        aggregate_id: &A::Id,
        from_sequence: u64,
    ) -> Result<Vec<EventEnvelope<A>>, JournalError>;
}
