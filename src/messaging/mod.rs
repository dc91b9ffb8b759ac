// ============================================================================
// Messaging - Domain Event Publication
// ============================================================================
//
// Fan-out of persisted envelopes and state signals to subscribers.
// Publication always happens after the journal append, never before.
//
// ============================================================================

mod event_bus;

pub use event_bus::{EventBus, Publication, StateSignal};
