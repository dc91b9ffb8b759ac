// ============================================================================
// Event Sourcing Store - Persistence Contract
// ============================================================================
//
// The journal trait is the only persistence interface the engine consumes.
// How bytes are physically stored is the backend's concern; the in-memory
// implementation here backs tests and the demo binary.
//
// ============================================================================

pub mod journal;
pub mod memory;

pub use journal::{Journal, JournalError};
pub use memory::InMemoryJournal;
