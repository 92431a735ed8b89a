//! Integration tests for the cross-stream query engine.

mod common;

use serde::Deserialize;
use uuid::Uuid;

use taskline_core::registry::EventTypeRegistry;
use taskline_core::search::SearchCriteria;
use taskline_core::store::{EventQuery, EventQueryExt, EventStore, ExpectedVersion};
use taskline_event_store::SqliteEventStore;

async fn seed_two_todoitems(store: &SqliteEventStore) {
    store
        .append_events(
            "todoitem-1",
            &[
                common::envelope("TodoItemCreatedEvent", common::at(1)),
                common::envelope("TodoItemUpdatedEvent", common::at(2)),
            ],
            ExpectedVersion::Any,
        )
        .await
        .unwrap();
    store
        .append_events(
            "todoitem-2",
            &[common::envelope("TodoItemCreatedEvent", common::at(3))],
            ExpectedVersion::Any,
        )
        .await
        .unwrap();
    store
        .append_events(
            "tag-1",
            &[common::envelope("TagCreatedEvent", common::at(4))],
            ExpectedVersion::Any,
        )
        .await
        .unwrap();
}

// --- events_by_type ---

#[tokio::test]
async fn test_events_by_type_groups_per_stream() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;

    let groups = store
        .events_by_type("TodoItemCreatedEvent", None, None)
        .await
        .unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].stream_name, "todoitem-1");
    assert_eq!(groups[0].events.len(), 1);
    assert_eq!(groups[0].events[0].event_type, "TodoItemCreatedEvent");
    assert_eq!(groups[1].stream_name, "todoitem-2");
    assert_eq!(groups[1].events.len(), 1);
}

#[tokio::test]
async fn test_events_by_type_group_version_is_subset_max() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;

    let groups = store
        .events_by_type("TodoItemCreatedEvent", None, None)
        .await
        .unwrap();

    // todoitem-1 is at version 2, but only its Created event (version 1)
    // matches, so the group reports 1.
    assert_eq!(groups[0].stream_name, "todoitem-1");
    assert_eq!(groups[0].version, 1);
    assert_eq!(store.stream_version("todoitem-1").await.unwrap(), 2);
}

#[tokio::test]
async fn test_events_by_type_respects_time_bounds() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;

    let groups = store
        .events_by_type(
            "TodoItemCreatedEvent",
            Some(common::at(2)),
            Some(common::at(4)),
        )
        .await
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].stream_name, "todoitem-2");
}

#[tokio::test]
async fn test_events_by_type_with_no_matches_is_empty() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;

    let groups = store
        .events_by_type("TodoItemDeletedEvent", None, None)
        .await
        .unwrap();

    assert!(groups.is_empty());
}

// --- events_by_aggregate ---

#[tokio::test]
async fn test_events_by_aggregate_matches_prefix_dash() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;

    let groups = store
        .events_by_aggregate("todoitem", None, None)
        .await
        .unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].stream_name, "todoitem-1");
    assert_eq!(groups[0].events.len(), 2);
    assert_eq!(groups[1].stream_name, "todoitem-2");
}

#[tokio::test]
async fn test_events_by_aggregate_requires_the_full_type_segment() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;

    // "todo-" is not a prefix of "todoitem-1".
    let groups = store.events_by_aggregate("todo", None, None).await.unwrap();

    assert!(groups.is_empty());
}

// --- all_events + registry replay ---

#[derive(Debug, Deserialize, PartialEq)]
struct TaggedPayload {
    tag: String,
}

#[derive(Debug, PartialEq)]
enum KnownEvent {
    TodoItemCreated(TaggedPayload),
    TagCreated(TaggedPayload),
}

fn registry() -> EventTypeRegistry<KnownEvent> {
    let mut registry = EventTypeRegistry::new();
    registry.register_with("TodoItemCreatedEvent", |payload| {
        serde_json::from_value::<TaggedPayload>(payload.clone()).map(KnownEvent::TodoItemCreated)
    });
    registry.register_with("TagCreatedEvent", |payload| {
        serde_json::from_value::<TaggedPayload>(payload.clone()).map(KnownEvent::TagCreated)
    });
    registry
}

#[tokio::test]
async fn test_all_events_ordered_by_timestamp_across_streams() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;

    let records = store.all_events(None, None).await.unwrap();

    assert_eq!(records.len(), 4);
    let timestamps: Vec<_> = records.iter().map(|e| e.occurred_at).collect();
    let mut sorted = timestamps.clone();
    sorted.sort();
    assert_eq!(timestamps, sorted);
    assert_eq!(records[0].stream_name, "todoitem-1");
    assert_eq!(records[3].stream_name, "tag-1");
}

#[tokio::test]
async fn test_all_events_time_bounds_are_inclusive() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;

    let records = store
        .all_events(Some(common::at(2)), Some(common::at(3)))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].occurred_at, common::at(2));
    assert_eq!(records[1].occurred_at, common::at(3));
}

#[tokio::test]
async fn test_replay_skips_unknown_types_and_reports_the_count() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;
    store
        .append_events(
            "todoitem-1",
            &[common::envelope("LegacyImportedEvent", common::at(6))],
            ExpectedVersion::Any,
        )
        .await
        .unwrap();

    let replayed = store.replay_all(&registry(), None, None).await.unwrap();

    // TodoItemUpdatedEvent and LegacyImportedEvent are not registered.
    assert_eq!(replayed.skipped, 2);
    assert_eq!(replayed.events.len(), 3);
    assert_eq!(
        replayed.events[0],
        KnownEvent::TodoItemCreated(TaggedPayload {
            tag: "TodoItemCreatedEvent".to_owned()
        })
    );
}

#[tokio::test]
async fn test_replay_skips_undecodable_payloads() {
    let store = common::store().await;
    store
        .append_events(
            "todoitem-1",
            &[common::envelope_with_payload(
                "TodoItemCreatedEvent",
                serde_json::json!({"tag": 42}),
                common::at(1),
            )],
            ExpectedVersion::Any,
        )
        .await
        .unwrap();

    let records = store.all_events(None, None).await.unwrap();
    let replayed = registry().decode_all(&records);

    assert_eq!(replayed.skipped, 1);
    assert!(replayed.events.is_empty());
}

// --- search_events ---

#[tokio::test]
async fn test_search_by_stream_name() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;

    let criteria = SearchCriteria {
        stream_name: Some("todoitem-1".to_owned()),
        ..SearchCriteria::default()
    };
    let groups = store.search_events(&criteria).await.unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].stream_name, "todoitem-1");
    assert_eq!(groups[0].events.len(), 2);
}

#[tokio::test]
async fn test_search_combines_filters_with_and() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;

    let criteria = SearchCriteria {
        aggregate_type: Some("todoitem".to_owned()),
        event_type: Some("TodoItemCreatedEvent".to_owned()),
        occurred_to: Some(common::at(2)),
        ..SearchCriteria::default()
    };
    let groups = store.search_events(&criteria).await.unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].stream_name, "todoitem-1");
    assert_eq!(groups[0].events.len(), 1);
}

#[tokio::test]
async fn test_search_by_correlation_id() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;
    let envelope = common::envelope("TodoItemUpdatedEvent", common::at(7));
    let correlation_id = envelope.metadata.correlation_id;
    store
        .append_events("todoitem-2", &[envelope], ExpectedVersion::Any)
        .await
        .unwrap();

    let criteria = SearchCriteria {
        correlation_id: Some(correlation_id),
        ..SearchCriteria::default()
    };
    let groups = store.search_events(&criteria).await.unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].stream_name, "todoitem-2");
    assert_eq!(groups[0].events.len(), 1);
    assert_eq!(
        groups[0].events[0].metadata.as_ref().unwrap().correlation_id,
        correlation_id
    );
}

#[tokio::test]
async fn test_search_unfiltered_returns_every_stream() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;

    let groups = store.search_events(&SearchCriteria::any()).await.unwrap();

    assert_eq!(groups.len(), 3);
}

#[tokio::test]
async fn test_search_pagination_can_split_a_stream_across_pages() {
    let store = common::store().await;
    for i in 0..4_u32 {
        store
            .append_events(
                "todoitem-1",
                &[common::envelope("TodoItemUpdatedEvent", common::at(i))],
                ExpectedVersion::Any,
            )
            .await
            .unwrap();
    }

    let first_page = store
        .search_events(&SearchCriteria {
            take: Some(3),
            ..SearchCriteria::default()
        })
        .await
        .unwrap();
    let second_page = store
        .search_events(&SearchCriteria {
            skip: Some(3),
            take: Some(3),
            ..SearchCriteria::default()
        })
        .await
        .unwrap();

    // Pagination applies to raw records before grouping, so the stream's
    // events land on both pages.
    assert_eq!(first_page.len(), 1);
    assert_eq!(first_page[0].events.len(), 3);
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].events.len(), 1);
    assert_eq!(second_page[0].events[0].version, 4);
}

#[tokio::test]
async fn test_search_skip_without_take_drops_the_head() {
    let store = common::store().await;
    seed_two_todoitems(&store).await;

    let groups = store
        .search_events(&SearchCriteria {
            skip: Some(3),
            ..SearchCriteria::default()
        })
        .await
        .unwrap();

    // Only the newest record (tag-1's) survives the skip.
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].stream_name, "tag-1");
}

// --- event_metadata ---

#[tokio::test]
async fn test_event_metadata_round_trips() {
    let store = common::store().await;
    let envelope = common::envelope("TodoItemCreatedEvent", common::at(1));
    let event_id = envelope.event_id;
    let correlation_id = envelope.metadata.correlation_id;

    store
        .append_events("todoitem-1", &[envelope], ExpectedVersion::Any)
        .await
        .unwrap();

    let metadata = store.event_metadata(event_id).await.unwrap().unwrap();
    assert_eq!(metadata.event_id, event_id);
    assert_eq!(metadata.user_id, "alice");
    assert_eq!(metadata.correlation_id, correlation_id);
    assert_eq!(metadata.occurred_at, common::at(1));
}

#[tokio::test]
async fn test_event_metadata_for_unknown_event_is_none() {
    let store = common::store().await;

    assert!(store.event_metadata(Uuid::new_v4()).await.unwrap().is_none());
}
