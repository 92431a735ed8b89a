//! Known-event-type registry.
//!
//! Persisted events carry a type tag and a JSON payload; turning them back
//! into concrete event values is an explicit, closed-world mapping from tag
//! to decoder rather than runtime reflection. Replay over historical events
//! is best-effort: records with unknown tags or undecodable payloads are
//! skipped with a warning, and the skip count is reported so callers and
//! tests can observe the gaps.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::store::StoredEvent;

type Decoder<E> =
    Box<dyn Fn(&serde_json::Value) -> Result<E, serde_json::Error> + Send + Sync>;

/// Maps event type tags to payload decoders producing a caller-chosen
/// unified event type `E` (typically an enum over the known events).
pub struct EventTypeRegistry<E: 'static> {
    decoders: HashMap<String, Decoder<E>>,
}

impl<E: 'static> Default for EventTypeRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> EventTypeRegistry<E> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers a payload type under a tag. The decoded value is converted
    /// into `E` via `Into`.
    pub fn register<T>(&mut self, event_type: &str)
    where
        T: DeserializeOwned + Into<E> + 'static,
    {
        self.register_with(event_type, |payload| {
            serde_json::from_value::<T>(payload.clone()).map(Into::into)
        });
    }

    /// Registers an arbitrary decoder closure under a tag.
    pub fn register_with<F>(&mut self, event_type: &str, decoder: F)
    where
        F: Fn(&serde_json::Value) -> Result<E, serde_json::Error> + Send + Sync + 'static,
    {
        self.decoders.insert(event_type.to_owned(), Box::new(decoder));
    }

    /// Whether a decoder is registered for this tag.
    #[must_use]
    pub fn contains(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Decodes one payload by tag. `None` when the tag is unregistered.
    #[must_use]
    pub fn decode(
        &self,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Option<Result<E, serde_json::Error>> {
        self.decoders.get(event_type).map(|decode| decode(payload))
    }

    /// Decodes a batch of stored events in order, skipping records whose
    /// tag is unknown or whose payload fails to decode. Each skip emits a
    /// `tracing` warning and increments the reported count.
    #[must_use]
    pub fn decode_all(&self, records: &[StoredEvent]) -> ReplayedEvents<E> {
        let mut events = Vec::with_capacity(records.len());
        let mut skipped = 0;

        for record in records {
            match self.decode(&record.event_type, &record.payload) {
                Some(Ok(event)) => events.push(event),
                Some(Err(e)) => {
                    skipped += 1;
                    tracing::warn!(
                        event_id = %record.event_id,
                        event_type = %record.event_type,
                        error = %e,
                        "skipping event with undecodable payload during replay"
                    );
                }
                None => {
                    skipped += 1;
                    tracing::warn!(
                        event_id = %record.event_id,
                        event_type = %record.event_type,
                        "skipping event with unknown type during replay"
                    );
                }
            }
        }

        ReplayedEvents { events, skipped }
    }
}

/// The outcome of a best-effort replay: the decoded events plus how many
/// records were skipped.
#[derive(Debug)]
pub struct ReplayedEvents<E> {
    /// Successfully decoded events, in input order.
    pub events: Vec<E>,
    /// Records dropped because of an unknown tag or a decode failure.
    pub skipped: usize,
}
