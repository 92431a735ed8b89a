//! Test stores — in-memory and always-failing `EventStore` implementations.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use taskline_core::envelope::EventEnvelope;
use taskline_core::error::EventStoreError;
use taskline_core::event::EventMetadata;
use taskline_core::search::SearchCriteria;
use taskline_core::snapshot::SnapshotRecord;
use taskline_core::store::{EventQuery, EventStore, ExpectedVersion, SnapshotStore, StoredEvent};
use taskline_core::stream::EventStream;

#[derive(Debug, Default)]
struct Inner {
    events: Vec<StoredEvent>,
    snapshots: HashMap<String, SnapshotRecord>,
}

impl Inner {
    fn stream_version(&self, stream_name: &str) -> i64 {
        self.events
            .iter()
            .filter(|e| e.stream_name == stream_name)
            .map(|e| e.version)
            .max()
            .unwrap_or(0)
    }

    fn matching(&self, criteria: &SearchCriteria) -> Vec<StoredEvent> {
        let mut records: Vec<StoredEvent> = self
            .events
            .iter()
            .filter(|e| {
                criteria
                    .stream_name
                    .as_ref()
                    .is_none_or(|name| &e.stream_name == name)
                    && criteria
                        .event_type
                        .as_ref()
                        .is_none_or(|tag| &e.event_type == tag)
                    && criteria
                        .aggregate_type
                        .as_ref()
                        .is_none_or(|agg| e.stream_name.starts_with(&format!("{agg}-")))
                    && criteria.correlation_id.is_none_or(|correlation| {
                        e.metadata
                            .as_ref()
                            .is_some_and(|m| m.correlation_id == correlation)
                    })
                    && criteria.occurred_from.is_none_or(|from| e.occurred_at >= from)
                    && criteria.occurred_to.is_none_or(|to| e.occurred_at <= to)
            })
            .cloned()
            .collect();

        records.sort_by(|a, b| {
            (a.occurred_at, &a.stream_name, a.version)
                .cmp(&(b.occurred_at, &b.stream_name, b.version))
        });

        if criteria.is_paginated() {
            let skip = criteria.skip.unwrap_or(0) as usize;
            let take = criteria.take.map_or(usize::MAX, |take| take as usize);
            records = records.into_iter().skip(skip).take(take).collect();
        }
        records
    }
}

/// An in-memory event store with the same observable semantics as the
/// SQLite backend: optimistic concurrency, atomic batches, snapshot
/// replacement, and the grouped query paths.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    inner: Mutex<Inner>,
}

impl MemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every stored event, in append order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn stored_events(&self) -> Vec<StoredEvent> {
        self.inner.lock().unwrap().events.clone()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append_events(
        &self,
        stream_name: &str,
        envelopes: &[EventEnvelope],
        expected: ExpectedVersion,
    ) -> Result<(), EventStoreError> {
        if envelopes.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.lock().unwrap();
        let current = inner.stream_version(stream_name);

        if let ExpectedVersion::Exact(expected) = expected {
            if current != expected {
                return Err(EventStoreError::ConcurrencyConflict {
                    stream_name: stream_name.to_owned(),
                    expected,
                    actual: current,
                });
            }
        }

        let mut version = current;
        for envelope in envelopes {
            version += 1;
            inner
                .events
                .push(StoredEvent::from_envelope(envelope, stream_name, version));
        }
        Ok(())
    }

    async fn stream_version(&self, stream_name: &str) -> Result<i64, EventStoreError> {
        Ok(self.inner.lock().unwrap().stream_version(stream_name))
    }

    async fn last_event_number(&self) -> Result<i64, EventStoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .events
            .iter()
            .max_by_key(|e| (e.occurred_at, e.version))
            .map_or(0, |e| e.version))
    }

    async fn events(
        &self,
        stream_name: &str,
        from_version: i64,
    ) -> Result<EventStream, EventStoreError> {
        let inner = self.inner.lock().unwrap();
        let mut events: Vec<StoredEvent> = inner
            .events
            .iter()
            .filter(|e| e.stream_name == stream_name && e.version > from_version)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(EventStream::new(stream_name, from_version, events))
    }
}

#[async_trait]
impl SnapshotStore for MemoryEventStore {
    async fn save_snapshot(&self, snapshot: SnapshotRecord) -> Result<(), EventStoreError> {
        self.inner
            .lock()
            .unwrap()
            .snapshots
            .insert(snapshot.stream_name.clone(), snapshot);
        Ok(())
    }

    async fn load_snapshot(
        &self,
        stream_name: &str,
    ) -> Result<Option<SnapshotRecord>, EventStoreError> {
        Ok(self.inner.lock().unwrap().snapshots.get(stream_name).cloned())
    }
}

#[async_trait]
impl EventQuery for MemoryEventStore {
    async fn events_by_type(
        &self,
        event_type: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventStream>, EventStoreError> {
        let criteria = SearchCriteria {
            event_type: Some(event_type.to_owned()),
            occurred_from: from,
            occurred_to: to,
            ..SearchCriteria::default()
        };
        let records = self.inner.lock().unwrap().matching(&criteria);
        Ok(EventStream::group_by_stream(records))
    }

    async fn events_by_aggregate(
        &self,
        aggregate_type: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventStream>, EventStoreError> {
        let criteria = SearchCriteria {
            aggregate_type: Some(aggregate_type.to_owned()),
            occurred_from: from,
            occurred_to: to,
            ..SearchCriteria::default()
        };
        let records = self.inner.lock().unwrap().matching(&criteria);
        Ok(EventStream::group_by_stream(records))
    }

    async fn all_events(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let criteria = SearchCriteria {
            occurred_from: from,
            occurred_to: to,
            ..SearchCriteria::default()
        };
        Ok(self.inner.lock().unwrap().matching(&criteria))
    }

    async fn search_events(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<EventStream>, EventStoreError> {
        let records = self.inner.lock().unwrap().matching(criteria);
        Ok(EventStream::group_by_stream(records))
    }

    async fn event_metadata(
        &self,
        event_id: Uuid,
    ) -> Result<Option<EventMetadata>, EventStoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .events
            .iter()
            .find(|e| e.event_id == event_id)
            .and_then(|e| e.metadata.clone()))
    }
}

/// An event store that always returns a storage error. Useful for testing
/// error-handling paths.
#[derive(Debug, Default)]
pub struct FailingEventStore;

impl FailingEventStore {
    fn error() -> EventStoreError {
        EventStoreError::Storage("connection refused".into())
    }
}

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append_events(
        &self,
        _stream_name: &str,
        _envelopes: &[EventEnvelope],
        _expected: ExpectedVersion,
    ) -> Result<(), EventStoreError> {
        Err(Self::error())
    }

    async fn stream_version(&self, _stream_name: &str) -> Result<i64, EventStoreError> {
        Err(Self::error())
    }

    async fn last_event_number(&self) -> Result<i64, EventStoreError> {
        Err(Self::error())
    }

    async fn events(
        &self,
        _stream_name: &str,
        _from_version: i64,
    ) -> Result<EventStream, EventStoreError> {
        Err(Self::error())
    }
}

#[async_trait]
impl SnapshotStore for FailingEventStore {
    async fn save_snapshot(&self, _snapshot: SnapshotRecord) -> Result<(), EventStoreError> {
        Err(Self::error())
    }

    async fn load_snapshot(
        &self,
        _stream_name: &str,
    ) -> Result<Option<SnapshotRecord>, EventStoreError> {
        Err(Self::error())
    }
}

#[async_trait]
impl EventQuery for FailingEventStore {
    async fn events_by_type(
        &self,
        _event_type: &str,
        _from: Option<DateTime<Utc>>,
        _to: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventStream>, EventStoreError> {
        Err(Self::error())
    }

    async fn events_by_aggregate(
        &self,
        _aggregate_type: &str,
        _from: Option<DateTime<Utc>>,
        _to: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventStream>, EventStoreError> {
        Err(Self::error())
    }

    async fn all_events(
        &self,
        _from: Option<DateTime<Utc>>,
        _to: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Err(Self::error())
    }

    async fn search_events(
        &self,
        _criteria: &SearchCriteria,
    ) -> Result<Vec<EventStream>, EventStoreError> {
        Err(Self::error())
    }

    async fn event_metadata(
        &self,
        _event_id: Uuid,
    ) -> Result<Option<EventMetadata>, EventStoreError> {
        Err(Self::error())
    }
}
