//! Shared test doubles for the Taskline event store.
//!
//! `MemoryEventStore` is a complete in-memory implementation of the store
//! traits with the same observable semantics as the SQLite backend, for
//! fast, deterministic consumer tests. `FailingEventStore` always returns a
//! storage error, for error-path tests.

mod store;

pub use store::{FailingEventStore, MemoryEventStore};
