//! Event store error types.

use thiserror::Error;

/// Top-level error type for event store operations.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Optimistic concurrency conflict on append.
    #[error(
        "concurrency conflict on stream {stream_name}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The stream that had the conflict.
        stream_name: String,
        /// The version the writer expected.
        expected: i64,
        /// The version actually found.
        actual: i64,
    },

    /// A payload, metadata record, or snapshot could not be encoded or
    /// decoded. Fatal on the write path; the read path skips the offending
    /// item instead of raising this.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lower-level storage error, propagated unchanged.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for EventStoreError {
    fn from(e: serde_json::Error) -> Self {
        EventStoreError::Serialization(e.to_string())
    }
}
