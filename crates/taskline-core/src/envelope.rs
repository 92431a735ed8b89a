//! Event envelope codec.
//!
//! An envelope is the serialized form of a domain event: the type tag, the
//! JSON payload, and the metadata record the store persists next to it.
//! Encoding happens once, before append; decoding goes through the
//! known-event-type registry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::EventStoreError;
use crate::event::{DomainEvent, EventMetadata, SYSTEM_USER};

/// A domain event in its serialized, ready-to-persist form.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type tag routing deserialization.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Metadata persisted alongside the payload.
    pub metadata: EventMetadata,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
}

impl EventEnvelope {
    /// Serializes a domain event into an envelope, applying the metadata
    /// defaults: a missing user becomes `"system"`, a missing correlation ID
    /// becomes a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::Serialization` if the payload cannot be
    /// serialized. Write-side serialization failures are fatal.
    pub fn encode<E>(event: &E) -> Result<Self, EventStoreError>
    where
        E: DomainEvent + Serialize,
    {
        let payload = serde_json::to_value(event)?;
        let metadata = EventMetadata {
            event_id: event.event_id(),
            user_id: event
                .user_id()
                .map_or_else(|| SYSTEM_USER.to_owned(), str::to_owned),
            correlation_id: event.correlation_id().unwrap_or_else(Uuid::new_v4),
            causation_id: event.causation_id(),
            additional: event.additional_metadata(),
            occurred_at: event.occurred_at(),
        };

        Ok(Self {
            event_id: event.event_id(),
            event_type: event.event_type().to_owned(),
            payload,
            metadata,
            occurred_at: event.occurred_at(),
        })
    }

    /// Encodes a batch of domain events in order.
    ///
    /// # Errors
    ///
    /// Returns the first serialization failure; none of the events are
    /// partially encoded in that case.
    pub fn encode_all<E>(events: &[E]) -> Result<Vec<Self>, EventStoreError>
    where
        E: DomainEvent + Serialize,
    {
        events.iter().map(Self::encode).collect()
    }
}
