//! The read-side event stream DTO.

use std::collections::BTreeMap;

use crate::store::StoredEvent;

/// A transient, per-request aggregation of events for one stream. Never
/// persisted; constructed fresh by every read.
#[derive(Debug, Clone)]
pub struct EventStream {
    /// The stream's name.
    pub stream_name: String,
    /// The max version among the included events, or the query's
    /// `from_version` bound when the result is empty. Callers must not
    /// assume data exists just because a version is returned.
    pub version: i64,
    /// The included events, ascending by version.
    pub events: Vec<StoredEvent>,
}

impl EventStream {
    /// Wraps a version-ordered result set for one stream.
    #[must_use]
    pub fn new(stream_name: &str, from_version: i64, events: Vec<StoredEvent>) -> Self {
        let version = events.last().map_or(from_version, |e| e.version);
        Self {
            stream_name: stream_name.to_owned(),
            version,
            events,
        }
    }

    /// Groups a flat record set into one `EventStream` per stream name,
    /// ordered by stream name, events within each group ascending by
    /// version. Each group's version is the max version among its records
    /// only.
    #[must_use]
    pub fn group_by_stream(records: Vec<StoredEvent>) -> Vec<Self> {
        let mut groups: BTreeMap<String, Vec<StoredEvent>> = BTreeMap::new();
        for record in records {
            groups.entry(record.stream_name.clone()).or_default().push(record);
        }

        groups
            .into_iter()
            .map(|(stream_name, mut events)| {
                events.sort_by_key(|e| e.version);
                let version = events.last().map_or(0, |e| e.version);
                Self {
                    stream_name,
                    version,
                    events,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    fn record(stream_name: &str, version: i64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            stream_name: stream_name.to_owned(),
            version,
            event_type: "TaskCreated".to_owned(),
            payload: serde_json::json!({}),
            metadata: None,
            occurred_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn new_takes_version_from_last_event() {
        let stream = EventStream::new("task-1", 0, vec![record("task-1", 1), record("task-1", 2)]);

        assert_eq!(stream.version, 2);
        assert_eq!(stream.events.len(), 2);
    }

    #[test]
    fn new_falls_back_to_from_version_when_empty() {
        let stream = EventStream::new("task-1", 7, vec![]);

        assert_eq!(stream.version, 7);
        assert!(stream.events.is_empty());
    }

    #[test]
    fn group_by_stream_partitions_and_sorts() {
        let records = vec![
            record("task-2", 2),
            record("task-1", 1),
            record("task-2", 1),
        ];

        let groups = EventStream::group_by_stream(records);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].stream_name, "task-1");
        assert_eq!(groups[0].version, 1);
        assert_eq!(groups[1].stream_name, "task-2");
        assert_eq!(groups[1].version, 2);
        assert_eq!(groups[1].events[0].version, 1);
        assert_eq!(groups[1].events[1].version, 2);
    }
}
