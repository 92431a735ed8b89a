//! Snapshot records and their typed codec.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::EventStoreError;

/// Materialized state a snapshot can persist. The type tag is an explicit
/// stable string, not a reflected type name.
pub trait SnapshotState: Serialize + DeserializeOwned {
    /// Stable tag identifying this state shape in storage.
    fn state_type() -> &'static str;
}

/// A persisted point-in-time materialized state for one stream. At most one
/// exists per stream; saving a new one replaces any prior snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    /// The stream this snapshot belongs to.
    pub stream_name: String,
    /// The stream version the state was materialized at. A hint, not a
    /// guarantee: callers must replay events past this version.
    pub version: i64,
    /// Type tag of the serialized state.
    pub state_type: String,
    /// The serialized state.
    pub state: serde_json::Value,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

impl SnapshotRecord {
    /// Serializes materialized state into a snapshot record.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Serialization` if the state cannot be
    /// serialized; write-side failures are fatal.
    pub fn encode<S>(
        stream_name: &str,
        version: i64,
        state: &S,
        created_at: DateTime<Utc>,
    ) -> Result<Self, EventStoreError>
    where
        S: SnapshotState,
    {
        Ok(Self {
            stream_name: stream_name.to_owned(),
            version,
            state_type: S::state_type().to_owned(),
            state: serde_json::to_value(state)?,
            created_at,
        })
    }

    /// Deserializes the snapshot into the caller's expected state type.
    ///
    /// A tag mismatch or decode failure yields `None` with a warning rather
    /// than an error: a lost snapshot is recovered by full replay.
    #[must_use]
    pub fn decode<S>(&self) -> Option<S>
    where
        S: SnapshotState,
    {
        if self.state_type != S::state_type() {
            tracing::warn!(
                stream_name = %self.stream_name,
                stored = %self.state_type,
                requested = S::state_type(),
                "snapshot state type mismatch; treating as no snapshot"
            );
            return None;
        }

        match serde_json::from_value(self.state.clone()) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(
                    stream_name = %self.stream_name,
                    version = self.version,
                    error = %e,
                    "snapshot failed to deserialize; treating as no snapshot"
                );
                None
            }
        }
    }
}
