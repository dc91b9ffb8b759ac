use crate::event_sourcing::{JournalError, RecoveryError};

// ============================================================================
// Command Dispatch Errors
// ============================================================================
//
// Every dispatched command resolves to either "envelopes with resulting
// sequence numbers" or exactly one of these. There are no silent no-ops
// and no partial event application.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CommandError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Command not applicable to current state. State unchanged, nothing
    /// appended; the domain error says why.
    #[error(transparent)]
    Rejected(E),

    /// Journal append found the stream advanced past the expected sequence.
    /// Fatal to the in-flight command; the instance discards its state and
    /// the next contact recovers fresh.
    #[error("concurrency conflict: expected sequence {expected}, stream is at {actual}")]
    Conflict { expected: u64, actual: u64 },

    /// Journal read or write failed. Retryable; the sequence number did not
    /// advance and nothing was published.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Gap or out-of-order record found while replaying history. Fatal and
    /// non-retryable for this identity.
    #[error("event history integrity violation: {0}")]
    Integrity(String),

    /// The aggregate instance stopped while the command was in flight and
    /// dispatch retries were exhausted.
    #[error("aggregate instance is no longer running")]
    ActorGone,
}

impl<E> From<JournalError> for CommandError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::Conflict { expected, actual } => Self::Conflict { expected, actual },
            JournalError::Storage(msg) => Self::Storage(msg),
        }
    }
}

impl<E> From<RecoveryError> for CommandError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: RecoveryError) -> Self {
        match err {
            RecoveryError::SequenceGap { .. } => Self::Integrity(err.to_string()),
            RecoveryError::Storage(msg) => Self::Storage(msg),
        }
    }
}
