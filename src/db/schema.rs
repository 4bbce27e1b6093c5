/// Complete database schema for the vault.
///
/// Uses CREATE TABLE/INDEX IF NOT EXISTS for idempotent execution.
/// Timestamps are unix milliseconds; list columns hold JSON arrays.
pub const INITIAL_SCHEMA: &str = r#"
-- Entries: captured fragments plus their (optional) analyzer metadata
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    themes TEXT,
    tone TEXT,
    kind TEXT,
    summary TEXT,
    analyzed_model TEXT,
    analyzed_at INTEGER
);

-- Newest-first listing
CREATE INDEX IF NOT EXISTS idx_entries_created ON entries(created_at);

-- Reflections written over recent entries
CREATE TABLE IF NOT EXISTS reflections (
    id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL,
    model TEXT NOT NULL,
    highlights TEXT NOT NULL,
    themes TEXT NOT NULL,
    note TEXT NOT NULL,
    entry_count INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reflections_created ON reflections(created_at);

-- Key/value user settings (selected model, ...)
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
