use std::fmt;

use super::event::DomainEvent;
use super::identity::AggregateId;

// ============================================================================
// Aggregate Root Pattern - Event Sourcing Core
// ============================================================================
//
// Key Principles:
// 1. State is derived from events (not stored directly)
// 2. Commands are validated before emitting events
// 3. Events represent facts that have already happened
// 4. Aggregates enforce business invariants
// 5. All state changes flow through events
//
// This is the GENERIC aggregate trait that works for ANY domain aggregate.
//
// ============================================================================

/// Generic aggregate trait - all event-sourced aggregates implement this.
///
/// `Default` is the empty state: an identity with zero events is valid and
/// sits at sequence number 0. State is only ever changed by `apply`, which
/// must be deterministic and side-effect-free so that replaying the same
/// history always reconstructs the same state.
pub trait Aggregate: Default + Clone + fmt::Debug + Send + Sync + 'static {
    type Id: AggregateId;
    type Command: Clone + Send + 'static;
    type Event: DomainEvent;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Type tag carried in every envelope for this aggregate.
    const AGGREGATE_TYPE: &'static str;

    /// Validate a command against current state and emit resulting events.
    ///
    /// An empty vec is an accepted no-op: nothing is appended and the
    /// sequence number does not advance. Rejection leaves state untouched.
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Fold one event into state.
    ///
    /// Infallible on purpose: validation happened in `handle_command`, and
    /// replay must never fail on an event that was once accepted.
    fn apply(&mut self, event: &Self::Event);
}
