//! SQLite schema for durable pipeline state.
//!
//! Episodes are the source of truth for feed content; the feed XML is a
//! regenerable projection and is never stored here.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    timezone TEXT NOT NULL,
    feed_token TEXT NOT NULL UNIQUE,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS credentials (
    user_id TEXT NOT NULL REFERENCES users(id),
    provider TEXT NOT NULL,
    access_token TEXT NOT NULL,
    refresh_token TEXT,
    expires_at TEXT NOT NULL,
    scopes TEXT NOT NULL DEFAULT '[]',
    revoked INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, provider)
);

CREATE TABLE IF NOT EXISTS generation_runs (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    trigger_kind TEXT NOT NULL,
    run_date TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    modules TEXT NOT NULL DEFAULT '[]',
    episodes_generated INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    calendar_snapshot TEXT,
    document_snapshot TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_user_date
    ON generation_runs(user_id, run_date);

CREATE UNIQUE INDEX IF NOT EXISTS idx_runs_one_active
    ON generation_runs(user_id, run_date)
    WHERE status IN ('pending', 'running');

CREATE TABLE IF NOT EXISTS episodes (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    run_date TEXT NOT NULL,
    kind TEXT NOT NULL,
    document_id TEXT,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    audio_url TEXT NOT NULL,
    audio_path TEXT NOT NULL,
    duration_seconds INTEGER NOT NULL,
    file_size_bytes INTEGER NOT NULL,
    published_at TEXT NOT NULL,
    rank INTEGER NOT NULL,
    source_data TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_episodes_user
    ON episodes(user_id, published_at DESC);
"#;
