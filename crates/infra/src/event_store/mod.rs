//! Append-only event store boundary.
//!
//! Streams are addressed by `StreamId` (one per sale, one per
//! `(payee, currency)` bucket). The trait makes no storage assumptions; the
//! in-memory implementation backs tests and the development server.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
