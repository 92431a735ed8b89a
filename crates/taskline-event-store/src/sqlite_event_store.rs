//! SQLite implementation of the event store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use taskline_core::envelope::EventEnvelope;
use taskline_core::error::EventStoreError;
use taskline_core::event::EventMetadata;
use taskline_core::search::SearchCriteria;
use taskline_core::snapshot::SnapshotRecord;
use taskline_core::store::{EventQuery, EventStore, ExpectedVersion, SnapshotStore, StoredEvent};
use taskline_core::stream::EventStream;

use crate::schema;

const EVENT_COLUMNS: &str =
    "event_id, stream_name, version, event_type, payload, metadata, occurred_at";

/// SQLite-backed event store.
#[derive(Debug, Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    /// Creates a store over an existing pool. The schema is not applied;
    /// call [`Self::migrate`] or manage it externally.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to a SQLite database URL (e.g. `sqlite://taskline.db?mode=rwc`)
    /// and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Storage` if the connection or schema
    /// application fails.
    pub async fn connect(url: &str) -> Result<Self, EventStoreError> {
        let pool = SqlitePoolOptions::new()
            .connect(url)
            .await
            .map_err(storage_error)?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Creates a store over a fresh in-memory database with the schema
    /// applied. The pool is pinned to a single long-lived connection so the
    /// database survives for the store's lifetime.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Storage` if the connection or schema
    /// application fails.
    pub async fn in_memory() -> Result<Self, EventStoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_error)?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Applies the event and snapshot table schema. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Storage` if a DDL statement fails.
    pub async fn migrate(&self) -> Result<(), EventStoreError> {
        sqlx::raw_sql(schema::CREATE_EVENTS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        sqlx::raw_sql(schema::CREATE_SNAPSHOTS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_records(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {EVENT_COLUMNS} FROM domain_events WHERE 1 = 1"
        ));

        if let Some(stream_name) = &criteria.stream_name {
            query.push(" AND stream_name = ").push_bind(stream_name.clone());
        }
        if let Some(event_type) = &criteria.event_type {
            query.push(" AND event_type = ").push_bind(event_type.clone());
        }
        if let Some(aggregate_type) = &criteria.aggregate_type {
            query
                .push(" AND stream_name LIKE ")
                .push_bind(format!("{aggregate_type}-%"));
        }
        if let Some(correlation_id) = criteria.correlation_id {
            query
                .push(" AND correlation_id = ")
                .push_bind(correlation_id.to_string());
        }
        if let Some(from) = criteria.occurred_from {
            query.push(" AND occurred_at >= ").push_bind(from);
        }
        if let Some(to) = criteria.occurred_to {
            query.push(" AND occurred_at <= ").push_bind(to);
        }

        query.push(" ORDER BY occurred_at ASC, stream_name ASC, version ASC");

        if criteria.is_paginated() {
            let limit = criteria.take.map_or(-1_i64, i64::from);
            let offset = criteria.skip.map_or(0_i64, i64::from);
            query
                .push(" LIMIT ")
                .push_bind(limit)
                .push(" OFFSET ")
                .push_bind(offset);
        }

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.iter().map(row_to_event).collect()
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn append_events(
        &self,
        stream_name: &str,
        envelopes: &[EventEnvelope],
        expected: ExpectedVersion,
    ) -> Result<(), EventStoreError> {
        if envelopes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM domain_events WHERE stream_name = ?")
                .bind(stream_name)
                .fetch_one(&mut *tx)
                .await
                .map_err(storage_error)?;
        let current = current.unwrap_or(0);

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
            let payload = serde_json::to_string(&envelope.payload)?;
            let metadata = serde_json::to_string(&envelope.metadata)?;

            let inserted = sqlx::query(
                "INSERT INTO domain_events \
                 (event_id, stream_name, version, event_type, payload, metadata, \
                  correlation_id, occurred_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(envelope.event_id.to_string())
            .bind(stream_name)
            .bind(version)
            .bind(&envelope.event_type)
            .bind(payload)
            .bind(metadata)
            .bind(envelope.metadata.correlation_id.to_string())
            .bind(envelope.occurred_at)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                // A unique violation on (stream_name, version) means another
                // writer committed between our version read and this insert.
                if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                    drop(tx);
                    let actual = self.stream_version(stream_name).await?;
                    return Err(EventStoreError::ConcurrencyConflict {
                        stream_name: stream_name.to_owned(),
                        expected: current,
                        actual,
                    });
                }
                return Err(storage_error(e));
            }
        }

        tx.commit().await.map_err(storage_error)?;

        tracing::debug!(
            stream_name,
            count = envelopes.len(),
            version,
            "appended events"
        );
        Ok(())
    }

    async fn stream_version(&self, stream_name: &str) -> Result<i64, EventStoreError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM domain_events WHERE stream_name = ?")
                .bind(stream_name)
                .fetch_one(&self.pool)
                .await
                .map_err(storage_error)?;
        Ok(version.unwrap_or(0))
    }

    async fn last_event_number(&self) -> Result<i64, EventStoreError> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM domain_events ORDER BY occurred_at DESC, version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(version.unwrap_or(0))
    }

    async fn events(
        &self,
        stream_name: &str,
        from_version: i64,
    ) -> Result<EventStream, EventStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM domain_events \
             WHERE stream_name = ? AND version > ? ORDER BY version ASC"
        ))
        .bind(stream_name)
        .bind(from_version)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let events = rows
            .iter()
            .map(row_to_event)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EventStream::new(stream_name, from_version, events))
    }
}

#[async_trait]
impl SnapshotStore for SqliteEventStore {
    async fn save_snapshot(&self, snapshot: SnapshotRecord) -> Result<(), EventStoreError> {
        let state = serde_json::to_string(&snapshot.state)?;

        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query("DELETE FROM stream_snapshots WHERE stream_name = ?")
            .bind(&snapshot.stream_name)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        sqlx::query(
            "INSERT INTO stream_snapshots \
             (stream_name, version, state_type, state, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&snapshot.stream_name)
        .bind(snapshot.version)
        .bind(&snapshot.state_type)
        .bind(state)
        .bind(snapshot.created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;

        tracing::debug!(
            stream_name = %snapshot.stream_name,
            version = snapshot.version,
            "saved snapshot"
        );
        Ok(())
    }

    async fn load_snapshot(
        &self,
        stream_name: &str,
    ) -> Result<Option<SnapshotRecord>, EventStoreError> {
        let row = sqlx::query(
            "SELECT stream_name, version, state_type, state, created_at \
             FROM stream_snapshots WHERE stream_name = ? \
             ORDER BY version DESC LIMIT 1",
        )
        .bind(stream_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match row {
            Some(row) => Ok(row_to_snapshot(&row)?),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl EventQuery for SqliteEventStore {
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
        let records = self.fetch_records(&criteria).await?;
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
        let records = self.fetch_records(&criteria).await?;
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
        self.fetch_records(&criteria).await
    }

    async fn search_events(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<EventStream>, EventStoreError> {
        let records = self.fetch_records(criteria).await?;
        Ok(EventStream::group_by_stream(records))
    }

    async fn event_metadata(
        &self,
        event_id: Uuid,
    ) -> Result<Option<EventMetadata>, EventStoreError> {
        let raw: Option<Option<String>> =
            sqlx::query_scalar("SELECT metadata FROM domain_events WHERE event_id = ?")
                .bind(event_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;

        Ok(raw.flatten().and_then(|raw| decode_metadata(&raw, event_id)))
    }
}

fn storage_error(e: sqlx::Error) -> EventStoreError {
    EventStoreError::Storage(e.to_string())
}

fn row_to_event(row: &SqliteRow) -> Result<StoredEvent, EventStoreError> {
    let event_id: String = row.try_get("event_id").map_err(storage_error)?;
    let event_id = Uuid::parse_str(&event_id)
        .map_err(|e| EventStoreError::Serialization(format!("invalid event id: {e}")))?;

    let payload: String = row.try_get("payload").map_err(storage_error)?;
    let payload = serde_json::from_str(&payload)?;

    let metadata: Option<String> = row.try_get("metadata").map_err(storage_error)?;
    let metadata = metadata.and_then(|raw| decode_metadata(&raw, event_id));

    Ok(StoredEvent {
        event_id,
        stream_name: row.try_get("stream_name").map_err(storage_error)?,
        version: row.try_get("version").map_err(storage_error)?,
        event_type: row.try_get("event_type").map_err(storage_error)?,
        payload,
        metadata,
        occurred_at: row.try_get("occurred_at").map_err(storage_error)?,
    })
}

fn row_to_snapshot(row: &SqliteRow) -> Result<Option<SnapshotRecord>, EventStoreError> {
    let stream_name: String = row.try_get("stream_name").map_err(storage_error)?;
    let version: i64 = row.try_get("version").map_err(storage_error)?;

    let state: String = row.try_get("state").map_err(storage_error)?;
    let state = match serde_json::from_str(&state) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(
                stream_name = %stream_name,
                version,
                error = %e,
                "snapshot state failed to parse; treating as no snapshot"
            );
            return Ok(None);
        }
    };

    Ok(Some(SnapshotRecord {
        stream_name,
        version,
        state_type: row.try_get("state_type").map_err(storage_error)?,
        state,
        created_at: row.try_get("created_at").map_err(storage_error)?,
    }))
}

fn decode_metadata(raw: &str, event_id: Uuid) -> Option<EventMetadata> {
    match serde_json::from_str(raw) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            tracing::warn!(
                %event_id,
                error = %e,
                "event metadata failed to deserialize; treating as absent"
            );
            None
        }
    }
}
