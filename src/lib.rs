//! Event-sourced aggregate roots coordinated by per-identity actors.
//!
//! A command is routed by the [`actors::AggregateManager`] to the single
//! live actor for its identity, validated against state reconstructed from
//! the [`event_sourcing::Journal`], appended as events, applied, and
//! published on the [`messaging::EventBus`]. Events are the sole source of
//! truth; state is always a derived projection.

pub mod actors;
pub mod domain;
pub mod event_sourcing;
pub mod messaging;
