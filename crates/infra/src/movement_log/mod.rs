//! Append-only movement log boundary.
//!
//! The log is the source of truth for the ledger: every projection (quantities, cost
//! books, alerts) is derived from it and can be rebuilt by replaying it.

pub mod in_memory;
pub mod journal;
pub mod r#trait;

pub use in_memory::InMemoryMovementStore;
pub use journal::JournalMovementStore;
pub use r#trait::{MovementStore, MovementStoreError};
