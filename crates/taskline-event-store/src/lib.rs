//! SQLite-backed event store for the Taskline backend.
//!
//! Implements the `taskline-core` store traits over a shared
//! `sqlx::SqlitePool`: the append engine with optimistic concurrency, the
//! stream reader and version tracker, the snapshot manager, and the
//! cross-stream query engine.

pub mod schema;
pub mod sqlite_event_store;

pub use sqlite_event_store::SqliteEventStore;
