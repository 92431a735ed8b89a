//! Search criteria for the cross-stream query engine.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Filters and pagination for [`crate::store::EventQuery::search_events`].
///
/// All fields are optional and combine with AND. `skip`/`take` apply to the
/// raw record set before grouping by stream.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    /// Exact stream name.
    pub stream_name: Option<String>,
    /// Exact event type tag.
    pub event_type: Option<String>,
    /// Aggregate type; matches streams named `"{aggregate_type}-{id}"`.
    pub aggregate_type: Option<String>,
    /// Correlation ID recorded in the events' metadata.
    pub correlation_id: Option<Uuid>,
    /// Inclusive lower occurred-at bound.
    pub occurred_from: Option<DateTime<Utc>>,
    /// Inclusive upper occurred-at bound.
    pub occurred_to: Option<DateTime<Utc>>,
    /// Records to skip before collecting the page.
    pub skip: Option<u32>,
    /// Max records in the page.
    pub take: Option<u32>,
}

impl SearchCriteria {
    /// Criteria matching every event.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Whether any pagination bound is set.
    #[must_use]
    pub fn is_paginated(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_everything_unpaginated() {
        let criteria = SearchCriteria::any();

        assert!(criteria.stream_name.is_none());
        assert!(criteria.event_type.is_none());
        assert!(criteria.aggregate_type.is_none());
        assert!(criteria.correlation_id.is_none());
        assert!(criteria.occurred_from.is_none());
        assert!(criteria.occurred_to.is_none());
        assert!(!criteria.is_paginated());
    }

    #[test]
    fn pagination_detected_from_either_bound() {
        let skip_only = SearchCriteria {
            skip: Some(10),
            ..SearchCriteria::default()
        };
        let take_only = SearchCriteria {
            take: Some(5),
            ..SearchCriteria::default()
        };

        assert!(skip_only.is_paginated());
        assert!(take_only.is_paginated());
    }
}
