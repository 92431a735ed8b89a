//! Domain event abstractions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user identifier recorded when an event carries no acting user.
pub const SYSTEM_USER: &str = "system";

/// Metadata attached to every persisted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// The owning event's identifier.
    pub event_id: Uuid,
    /// The acting user, or `"system"` when no user was involved.
    pub user_id: String,
    /// Correlation ID tracing a command through its effects. Defaulted to a
    /// fresh identifier when the source event carries none.
    pub correlation_id: Uuid,
    /// ID of the event that caused this one, when known.
    pub causation_id: Option<Uuid>,
    /// Free-form key/value data carried alongside the event.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional: BTreeMap<String, serde_json::Value>,
    /// When the event occurred (caller-supplied).
    pub occurred_at: DateTime<Utc>,
}

/// Trait that all domain events implement.
///
/// The payload itself is serialized through `serde`; this trait exposes the
/// identity and causal metadata the store records next to it.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Unique identifier of this event.
    fn event_id(&self) -> Uuid;

    /// The event type tag (used for persistence and replay routing).
    fn event_type(&self) -> &'static str;

    /// When the event occurred. Caller-supplied, never server-assigned.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// The acting user, if any.
    fn user_id(&self) -> Option<&str> {
        None
    }

    /// Correlation ID linking this event to the command that produced it.
    fn correlation_id(&self) -> Option<Uuid> {
        None
    }

    /// ID of the event that caused this one.
    fn causation_id(&self) -> Option<Uuid> {
        None
    }

    /// Free-form key/value data to record in the event's metadata.
    fn additional_metadata(&self) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::new()
    }
}
