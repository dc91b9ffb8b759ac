use std::fmt;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

// ============================================================================
// Aggregate Identity
// ============================================================================
//
// Every aggregate instance is addressed by a typed, immutable identity.
// The identity is created by the caller before the first command and never
// changes for the lifetime of the instance's event history.
//
// ============================================================================

/// Marker trait for typed aggregate identities.
///
/// Concrete identities are usually UUID newtypes (see the cart domain's
/// `CartId`). The bounds cover everything the engine needs: hashing for the
/// instance registry, `Display` for metadata and logging, serde for the
/// journal, and `Send + Sync + 'static` so identities can cross task
/// boundaries.
pub trait AggregateId:
    Clone
    + Eq
    + Hash
    + fmt::Debug
    + fmt::Display
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}
