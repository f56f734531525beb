//! Database schema and migrations for PESOS.
//!
//! Migrations are applied sequentially when the database is first opened
//! or upgraded; the schema_version table tracks which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: users, sources, subscriptions and items
    r#"
CREATE TABLE users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    username    TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

-- A feed URL shared by every subscriber. Deactivated, never deleted.
CREATE TABLE sources (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    url         TEXT NOT NULL UNIQUE,
    active      TEXT NOT NULL DEFAULT 'Y' CHECK (active IN ('Y', 'N')),
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_sources_active ON sources(active);

CREATE TABLE user_sources (
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    source_id   INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(user_id, source_id)
);

CREATE INDEX idx_user_sources_source_id ON user_sources(source_id);

-- One row per (user, feed entry); each subscriber owns a copy.
CREATE TABLE items (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    url         TEXT NOT NULL,
    description TEXT,
    postdate    TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    source_id   INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(user_id, source_id, url)
);

CREATE INDEX idx_items_user_postdate ON items(user_id, postdate);
"#,
    // v2: activity log for synchronization audit events
    r#"
CREATE TABLE activity_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type  TEXT NOT NULL,
    triggered_by TEXT NOT NULL,
    success     INTEGER NOT NULL,
    message     TEXT,
    metadata    TEXT NOT NULL DEFAULT '{}',
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_activity_log_event_type ON activity_log(event_type);
"#,
];
