//! Database schema definitions.
//!
//! One relational table each for sessions and messages, an FTS5
//! external-content index over the sessions' searchable text, a vector
//! table holding one embedding BLOB per session, and the reserved sync log.

use rusqlite::{Connection, Result};

/// The complete SQL schema for the memory database.
///
/// Timestamps are stored as INTEGER unix seconds. Keywords are stored as a
/// JSON array; the FTS index sees the raw JSON text, which tokenizes to the
/// contained words.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Core Tables
-- ====================

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    summary TEXT,
    keywords_json TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    token_count INTEGER NOT NULL DEFAULT 0,
    work_dir TEXT,
    is_archived INTEGER NOT NULL DEFAULT 0,
    sync_status TEXT NOT NULL DEFAULT 'local',
    sync_version INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_sessions_archived ON sessions(is_archived);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    token_count INTEGER NOT NULL DEFAULT 0,
    timestamp INTEGER NOT NULL,
    has_code INTEGER NOT NULL DEFAULT 0,
    code_language TEXT,
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_session_time
    ON messages(session_id, timestamp);

-- ====================
-- Full-Text Index
-- ====================

-- External-content FTS5 table over the sessions' searchable text.
CREATE VIRTUAL TABLE IF NOT EXISTS sessions_fts USING fts5(
    title,
    summary,
    keywords,
    content='sessions',
    content_rowid='rowid'
);

-- External-content tables require the delete+insert trigger form.
CREATE TRIGGER IF NOT EXISTS sessions_fts_insert
AFTER INSERT ON sessions BEGIN
    INSERT INTO sessions_fts(rowid, title, summary, keywords)
    VALUES (new.rowid, new.title, new.summary, new.keywords_json);
END;

CREATE TRIGGER IF NOT EXISTS sessions_fts_delete
AFTER DELETE ON sessions BEGIN
    INSERT INTO sessions_fts(sessions_fts, rowid, title, summary, keywords)
    VALUES ('delete', old.rowid, old.title, old.summary, old.keywords_json);
END;

CREATE TRIGGER IF NOT EXISTS sessions_fts_update
AFTER UPDATE ON sessions BEGIN
    INSERT INTO sessions_fts(sessions_fts, rowid, title, summary, keywords)
    VALUES ('delete', old.rowid, old.title, old.summary, old.keywords_json);
    INSERT INTO sessions_fts(rowid, title, summary, keywords)
    VALUES (new.rowid, new.title, new.summary, new.keywords_json);
END;

-- ====================
-- Vector Storage
-- ====================

-- One embedding per session, stored as little-endian f32 bytes.
CREATE TABLE IF NOT EXISTS session_vectors (
    session_id TEXT PRIMARY KEY,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

-- ====================
-- Sync Support (reserved)
-- ====================

CREATE TABLE IF NOT EXISTS sync_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sync_type TEXT NOT NULL,
    session_id TEXT,
    status TEXT NOT NULL,
    error_message TEXT,
    timestamp INTEGER NOT NULL
);
";

/// Apply the schema to the database.
///
/// Uses `execute_batch` to run the entire DDL script. Idempotent because
/// all statements use `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    set_pragmas(conn)?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Connection-level pragmas; applied to every connection, not just the one
/// that ran the DDL (`foreign_keys` in particular is per-connection).
///
/// # Errors
///
/// Returns an error if a pragma cannot be set.
pub fn set_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}
