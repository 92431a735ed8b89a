//! Event store database schema.

/// SQL to create the events table.
///
/// The `UNIQUE (stream_name, version)` constraint is the storage-level
/// backstop for optimistic concurrency: even if two writers pass the
/// version check, only one batch can land.
pub const CREATE_EVENTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS domain_events (
    event_id       TEXT PRIMARY KEY,
    stream_name    TEXT NOT NULL,
    version        INTEGER NOT NULL,
    event_type     TEXT NOT NULL,
    payload        TEXT NOT NULL,
    metadata       TEXT,
    correlation_id TEXT NOT NULL,
    occurred_at    TEXT NOT NULL,
    UNIQUE (stream_name, version)
);

CREATE INDEX IF NOT EXISTS idx_domain_events_stream
    ON domain_events (stream_name, version);

CREATE INDEX IF NOT EXISTS idx_domain_events_event_type
    ON domain_events (event_type);

CREATE INDEX IF NOT EXISTS idx_domain_events_correlation_id
    ON domain_events (correlation_id);

CREATE INDEX IF NOT EXISTS idx_domain_events_occurred_at
    ON domain_events (occurred_at);
";

/// SQL to create the snapshots table.
pub const CREATE_SNAPSHOTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS stream_snapshots (
    stream_name TEXT NOT NULL,
    version     INTEGER NOT NULL,
    state_type  TEXT NOT NULL,
    state       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (stream_name, version)
);
";
