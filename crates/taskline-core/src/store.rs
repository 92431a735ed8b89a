//! Event store traits and the stored event record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::envelope::EventEnvelope;
use crate::error::EventStoreError;
use crate::event::{DomainEvent, EventMetadata};
use crate::registry::{EventTypeRegistry, ReplayedEvents};
use crate::search::SearchCriteria;
use crate::snapshot::{SnapshotRecord, SnapshotState};
use crate::stream::EventStream;

/// Stored representation of a domain event.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Stream this event belongs to.
    pub stream_name: String,
    /// Monotonically increasing, 1-based version within the stream.
    pub version: i64,
    /// Event type tag for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Metadata recorded with the event, when present and decodable.
    pub metadata: Option<EventMetadata>,
    /// When the event occurred (caller-supplied).
    pub occurred_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Builds the record an envelope becomes once a version is assigned.
    #[must_use]
    pub fn from_envelope(envelope: &EventEnvelope, stream_name: &str, version: i64) -> Self {
        Self {
            event_id: envelope.event_id,
            stream_name: stream_name.to_owned(),
            version,
            event_type: envelope.event_type.clone(),
            payload: envelope.payload.clone(),
            metadata: Some(envelope.metadata.clone()),
            occurred_at: envelope.occurred_at,
        }
    }
}

/// The version a writer expects a stream to be at when appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedVersion {
    /// No concurrency check; append unconditionally.
    #[default]
    Any,
    /// Fail with a concurrency conflict unless the stream is exactly at
    /// this version.
    Exact(i64),
}

/// Append and read access to event streams.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of envelopes to a stream, assigning versions
    /// `current + 1 ..= current + n` in input order. The whole batch is
    /// persisted as one atomic unit.
    ///
    /// An empty batch returns immediately without touching the store or
    /// checking versions.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::ConcurrencyConflict` when `expected` is
    /// `Exact(v)` and the stream is not at version `v`; the stream is left
    /// unmodified. Conflicts are never retried internally. Storage errors
    /// propagate unchanged.
    async fn append_events(
        &self,
        stream_name: &str,
        envelopes: &[EventEnvelope],
        expected: ExpectedVersion,
    ) -> Result<(), EventStoreError>;

    /// Returns the version of the stream's most recent event, or 0 if the
    /// stream has never been written.
    ///
    /// # Errors
    ///
    /// Storage errors propagate unchanged.
    async fn stream_version(&self, stream_name: &str) -> Result<i64, EventStoreError>;

    /// Returns the version carried by the most recently timestamped event
    /// across all streams, or 0 if the store is empty. A coarse watermark,
    /// not a per-stream correctness primitive.
    ///
    /// # Errors
    ///
    /// Storage errors propagate unchanged.
    async fn last_event_number(&self) -> Result<i64, EventStoreError>;

    /// Returns the stream's events with version strictly greater than
    /// `from_version`, ascending. Unknown or empty streams yield an empty
    /// result with `version = from_version`, never an error.
    ///
    /// # Errors
    ///
    /// Storage errors propagate unchanged.
    async fn events(
        &self,
        stream_name: &str,
        from_version: i64,
    ) -> Result<EventStream, EventStoreError>;
}

/// Persistence for per-stream materialized state snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persists a snapshot, replacing any prior snapshot for the stream.
    /// At most one snapshot row exists per stream afterwards.
    ///
    /// Not transactionally linked to concurrent appends: the recorded
    /// version is a hint, and callers must replay events past it before
    /// trusting reconstructed state.
    ///
    /// # Errors
    ///
    /// Storage errors propagate unchanged.
    async fn save_snapshot(&self, snapshot: SnapshotRecord) -> Result<(), EventStoreError>;

    /// Returns the stream's snapshot, or `None` if none exists.
    ///
    /// # Errors
    ///
    /// Storage errors propagate unchanged.
    async fn load_snapshot(
        &self,
        stream_name: &str,
    ) -> Result<Option<SnapshotRecord>, EventStoreError>;
}

/// Read-only queries across streams, for auditing, projections, and
/// rebuilding read models.
#[async_trait]
pub trait EventQuery: Send + Sync {
    /// Returns events whose type tag equals `event_type`, within the
    /// optional inclusive occurred-at bounds, grouped by stream. Each
    /// group's version is the max version among the *matching* events
    /// only, not the stream's current version.
    ///
    /// # Errors
    ///
    /// Storage errors propagate unchanged.
    async fn events_by_type(
        &self,
        event_type: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventStream>, EventStoreError>;

    /// Returns events from streams named `"{aggregate_type}-{id}"`, within
    /// the optional inclusive occurred-at bounds, grouped by stream.
    ///
    /// # Errors
    ///
    /// Storage errors propagate unchanged.
    async fn events_by_aggregate(
        &self,
        aggregate_type: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventStream>, EventStoreError>;

    /// Returns every event within the optional inclusive occurred-at
    /// bounds, across all streams, ordered by occurred-at. Typed replay is
    /// layered on top via [`crate::registry::EventTypeRegistry::decode_all`].
    ///
    /// # Errors
    ///
    /// Storage errors propagate unchanged.
    async fn all_events(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// General filtered search, grouped by stream. `skip`/`take` paginate
    /// the raw record set *before* grouping, so a page boundary can split
    /// one stream's events across two calls.
    ///
    /// # Errors
    ///
    /// Storage errors propagate unchanged.
    async fn search_events(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<EventStream>, EventStoreError>;

    /// Returns the metadata recorded with a single event, or `None` when
    /// the event is unknown or its metadata is absent or undecodable.
    ///
    /// # Errors
    ///
    /// Storage errors propagate unchanged.
    async fn event_metadata(
        &self,
        event_id: Uuid,
    ) -> Result<Option<EventMetadata>, EventStoreError>;
}

/// Typed convenience over [`EventStore`]: encode domain events through the
/// envelope codec and append them in one call.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Encodes `events` in order and appends them to the stream.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Serialization` if any event fails to
    /// encode (nothing is appended), plus every error `append_events` can
    /// return.
    async fn append_domain_events<E>(
        &self,
        stream_name: &str,
        events: &[E],
        expected: ExpectedVersion,
    ) -> Result<(), EventStoreError>
    where
        E: DomainEvent + Serialize + Sync,
    {
        let envelopes = EventEnvelope::encode_all(events)?;
        self.append_events(stream_name, &envelopes, expected).await
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Typed convenience over [`SnapshotStore`]: load and decode in one call.
#[async_trait]
pub trait SnapshotStoreExt: SnapshotStore {
    /// Loads the stream's snapshot and decodes it to the expected state
    /// type. `None` when no snapshot exists, the stored type tag differs,
    /// or deserialization fails; decode failures are swallowed so a lost
    /// snapshot heals via full replay.
    ///
    /// # Errors
    ///
    /// Storage errors propagate unchanged.
    async fn load_state<S>(&self, stream_name: &str) -> Result<Option<S>, EventStoreError>
    where
        S: SnapshotState + Send,
    {
        Ok(self
            .load_snapshot(stream_name)
            .await?
            .and_then(|record| record.decode()))
    }
}

impl<T: SnapshotStore + ?Sized> SnapshotStoreExt for T {}

/// Typed convenience over [`EventQuery`]: best-effort replay of every event
/// in the time bounds through a known-event-type registry.
#[async_trait]
pub trait EventQueryExt: EventQuery {
    /// Fetches all events in the bounds and decodes them via `registry`.
    /// Records with unknown tags or undecodable payloads are skipped and
    /// counted, never raised.
    ///
    /// # Errors
    ///
    /// Storage errors propagate unchanged.
    async fn replay_all<E>(
        &self,
        registry: &EventTypeRegistry<E>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<ReplayedEvents<E>, EventStoreError>
    where
        E: Send + 'static,
    {
        let records = self.all_events(from, to).await?;
        Ok(registry.decode_all(&records))
    }
}

impl<T: EventQuery + ?Sized> EventQueryExt for T {}
