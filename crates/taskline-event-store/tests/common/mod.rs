//! Shared test helpers for event store integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use taskline_core::envelope::EventEnvelope;
use taskline_core::event::EventMetadata;
use taskline_event_store::SqliteEventStore;

/// Fresh in-memory store with the schema applied.
pub async fn store() -> SqliteEventStore {
    SqliteEventStore::in_memory()
        .await
        .expect("in-memory store should open")
}

/// Deterministic timestamp `second`s into the test's fixed minute.
pub fn at(second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, second).unwrap()
}

/// Envelope with the given type tag, a payload carrying the tag, and fully
/// populated metadata.
pub fn envelope(event_type: &str, occurred_at: DateTime<Utc>) -> EventEnvelope {
    envelope_with_payload(event_type, serde_json::json!({"tag": event_type}), occurred_at)
}

/// Envelope with an explicit payload.
pub fn envelope_with_payload(
    event_type: &str,
    payload: serde_json::Value,
    occurred_at: DateTime<Utc>,
) -> EventEnvelope {
    let event_id = Uuid::new_v4();
    EventEnvelope {
        event_id,
        event_type: event_type.to_owned(),
        payload,
        metadata: EventMetadata {
            event_id,
            user_id: "alice".to_owned(),
            correlation_id: Uuid::new_v4(),
            causation_id: None,
            additional: BTreeMap::new(),
            occurred_at,
        },
        occurred_at,
    }
}
