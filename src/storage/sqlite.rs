//! SQLite storage implementation.
//!
//! Each calling thread owns a dedicated connection: connections live in a
//! thread-local registry keyed by store instance, so multi-threaded callers
//! (and the background index worker) never share a handle. In-memory stores
//! use a shared-cache URI so every thread still observes the same database.
//!
//! Vector search is a brute-force cosine scan over per-session embedding
//! BLOBs. Stores opened without vector support degrade gracefully: the
//! vector leg returns nothing, `update_embedding` is a no-op, and
//! `get_stats` reports `vec_available = false`.

use crate::error::{Error, Result};
use crate::model::{now_ts, Message, Role, Session, SyncStatus};
use crate::storage::schema::{apply_schema, set_pragmas};
use crate::storage::{StorageBackend, StoreStats};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Process-wide source of unique store ids (never reused, so a stale
/// thread-local connection can never be mistaken for another store's).
static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// This thread's connections, one per live store instance.
    static CONNECTIONS: RefCell<HashMap<u64, Connection>> = RefCell::new(HashMap::new());
}

/// Where the database lives.
#[derive(Debug, Clone)]
enum StoreLocation {
    File(PathBuf),
    /// Shared-cache in-memory database, addressed by URI.
    Memory(String),
}

/// SQLite-based storage backend.
pub struct SqliteStorage {
    id: u64,
    location: StoreLocation,
    vec_enabled: bool,
    closed: AtomicBool,
    /// Keeps shared-cache memory databases alive between calls and pins
    /// the WAL file open for file databases. Never used for queries.
    anchor: Mutex<Option<Connection>>,
}

impl SqliteStorage {
    /// Open a database at the given path, creating it and applying the
    /// schema if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema fails to apply.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_vectors(path, true)
    }

    /// Open a database with an explicit vector-support flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema fails to apply.
    pub fn open_with_vectors(path: &Path, vec_enabled: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let storage = Self {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            location: StoreLocation::File(path.to_path_buf()),
            vec_enabled,
            closed: AtomicBool::new(false),
            anchor: Mutex::new(None),
        };
        storage.initialize()?;
        Ok(storage)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        Self::open_memory_with_vectors(true)
    }

    /// Open an in-memory database without vector support, for exercising
    /// the degraded path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory_without_vectors() -> Result<Self> {
        Self::open_memory_with_vectors(false)
    }

    fn open_memory_with_vectors(vec_enabled: bool) -> Result<Self> {
        let id = NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed);
        let storage = Self {
            id,
            location: StoreLocation::Memory(format!(
                "file:mnemo-mem-{id}?mode=memory&cache=shared"
            )),
            vec_enabled,
            closed: AtomicBool::new(false),
            anchor: Mutex::new(None),
        };
        storage.initialize()?;
        Ok(storage)
    }

    /// Whether the vector leg is usable.
    #[must_use]
    pub fn vec_available(&self) -> bool {
        self.vec_enabled
    }

    fn open_raw(&self) -> Result<Connection> {
        let conn = match &self.location {
            StoreLocation::File(path) => Connection::open(path)?,
            StoreLocation::Memory(uri) => Connection::open_with_flags(
                uri,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )?,
        };
        conn.busy_timeout(Duration::from_secs(5))?;
        set_pragmas(&conn)?;
        Ok(conn)
    }

    /// Run `f` with this thread's connection, opening one on first use.
    ///
    /// Storage methods must not call each other from inside the closure:
    /// the thread-local registry is borrowed for the duration of the call.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::NotInitialized);
        }
        CONNECTIONS.with(|cell| {
            let mut map = cell.borrow_mut();
            if !map.contains_key(&self.id) {
                map.insert(self.id, self.open_raw()?);
            }
            let conn = map.get_mut(&self.id).expect("connection just inserted");
            f(conn)
        })
    }

    fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
        let keywords_json: String = row.get("keywords_json")?;
        let keywords: Vec<String> = serde_json::from_str(&keywords_json).unwrap_or_default();
        let sync_status: String = row.get("sync_status")?;
        Ok(Session {
            id: row.get("id")?,
            title: row.get("title")?,
            summary: row.get("summary")?,
            keywords,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            token_count: row.get("token_count")?,
            work_dir: row.get("work_dir")?,
            is_archived: row.get("is_archived")?,
            sync_status: sync_status.parse().unwrap_or_default(),
            sync_version: row.get("sync_version")?,
        })
    }

    fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
        let role: String = row.get("role")?;
        Ok(Message {
            id: Some(row.get("id")?),
            session_id: row.get("session_id")?,
            role: role.parse().unwrap_or(Role::User),
            content: row.get("content")?,
            token_count: row.get("token_count")?,
            timestamp: row.get("timestamp")?,
            has_code: row.get("has_code")?,
            code_language: row.get("code_language")?,
        })
    }
}

impl Drop for SqliteStorage {
    fn drop(&mut self) {
        self.close();
    }
}

const SESSION_COLUMNS: &str = "id, title, summary, keywords_json, created_at, updated_at, \
     token_count, work_dir, is_archived, sync_status, sync_version";

const MESSAGE_COLUMNS: &str =
    "id, session_id, role, content, token_count, timestamp, has_code, code_language";

impl StorageBackend for SqliteStorage {
    fn initialize(&self) -> Result<()> {
        let mut anchor = self.anchor.lock().expect("anchor lock poisoned");
        if anchor.is_none() {
            let conn = self.open_raw()?;
            apply_schema(&conn)?;
            *anchor = Some(conn);
        }
        self.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        CONNECTIONS.with(|cell| {
            cell.borrow_mut().remove(&self.id);
        });
        if let Ok(mut anchor) = self.anchor.lock() {
            *anchor = None;
        }
    }

    // ── Session operations ──────────────────────────────────

    fn create_session(&self, session: &Session) -> Result<()> {
        let keywords_json = serde_json::to_string(&session.keywords)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions
                 (id, title, summary, keywords_json, created_at, updated_at,
                  token_count, work_dir, is_archived, sync_status, sync_version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    session.id,
                    session.title,
                    session.summary,
                    keywords_json,
                    session.created_at,
                    session.updated_at,
                    session.token_count,
                    session.work_dir,
                    session.is_archived,
                    session.sync_status.as_str(),
                    session.sync_version,
                ],
            )?;
            Ok(())
        })
    }

    fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"))?;
            Ok(stmt
                .query_row([session_id], Self::row_to_session)
                .optional()?)
        })
    }

    fn update_session(&self, session: &mut Session) -> Result<()> {
        session.updated_at = now_ts();
        let keywords_json = serde_json::to_string(&session.keywords)?;
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET
                     title = ?1, summary = ?2, keywords_json = ?3, updated_at = ?4,
                     token_count = ?5, work_dir = ?6, is_archived = ?7,
                     sync_status = ?8, sync_version = ?9
                 WHERE id = ?10",
                rusqlite::params![
                    session.title,
                    session.summary,
                    keywords_json,
                    session.updated_at,
                    session.token_count,
                    session.work_dir,
                    session.is_archived,
                    session.sync_status.as_str(),
                    session.sync_version,
                    session.id,
                ],
            )?;
            Ok(())
        })
    }

    fn list_sessions(
        &self,
        limit: usize,
        offset: usize,
        archived: Option<bool>,
    ) -> Result<Vec<Session>> {
        self.with_conn(|conn| {
            let rows = if let Some(flag) = archived {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions WHERE is_archived = ?1
                     ORDER BY updated_at DESC LIMIT ?2 OFFSET ?3"
                ))?;
                let mapped = stmt.query_map(
                    rusqlite::params![flag, limit as i64, offset as i64],
                    Self::row_to_session,
                )?;
                mapped.collect::<rusqlite::Result<Vec<_>>>()?
            } else {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions
                     ORDER BY updated_at DESC LIMIT ?1 OFFSET ?2"
                ))?;
                let mapped = stmt.query_map(
                    rusqlite::params![limit as i64, offset as i64],
                    Self::row_to_session,
                )?;
                mapped.collect::<rusqlite::Result<Vec<_>>>()?
            };
            Ok(rows)
        })
    }

    fn archive_session(&self, session_id: &str, archived: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET is_archived = ?1 WHERE id = ?2",
                rusqlite::params![archived, session_id],
            )?;
            Ok(())
        })
    }

    fn delete_session(&self, session_id: &str) -> Result<()> {
        // Messages and the vector go with it via ON DELETE CASCADE, inside
        // the same implicit statement transaction.
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", [session_id])?;
            Ok(())
        })
    }

    // ── Message operations ──────────────────────────────────

    fn add_message(&self, message: &mut Message) -> Result<i64> {
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                 (session_id, role, content, token_count, timestamp, has_code, code_language)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    message.session_id,
                    message.role.as_str(),
                    message.content,
                    message.token_count,
                    message.timestamp,
                    message.has_code,
                    message.code_language,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        message.id = Some(id);
        Ok(id)
    }

    fn get_messages(
        &self,
        session_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE session_id = ?1
                 ORDER BY timestamp, id
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(
                rusqlite::params![session_id, limit as i64, offset as i64],
                Self::row_to_message,
            )?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn get_recent_messages(&self, session_id: &str, n: usize) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE session_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(
                rusqlite::params![session_id, n as i64],
                Self::row_to_message,
            )?;
            let mut messages = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            messages.reverse();
            Ok(messages)
        })
    }

    fn count_messages(&self, session_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
                [session_id],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }

    // ── Search primitives ───────────────────────────────────

    fn search_by_keywords(&self, query: &str, top_k: usize) -> Result<Vec<(String, f64)>> {
        let escaped = query.replace('"', "\"\"");
        self.with_conn(|conn| {
            let run = || -> rusqlite::Result<Vec<(String, f64)>> {
                let mut stmt = conn.prepare(
                    "SELECT s.id, sessions_fts.rank
                     FROM sessions_fts
                     JOIN sessions s ON s.rowid = sessions_fts.rowid
                     WHERE sessions_fts MATCH ?1
                     ORDER BY sessions_fts.rank
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(
                    rusqlite::params![escaped, top_k as i64],
                    |row| {
                        let id: String = row.get(0)?;
                        let rank: Option<f64> = row.get(1)?;
                        Ok((id, rank.unwrap_or(0.0)))
                    },
                )?;
                rows.collect()
            };
            match run() {
                // Smaller rank is better; map to a (0, 1] similarity.
                Ok(rows) => Ok(rows
                    .into_iter()
                    .map(|(id, rank)| (id, 1.0 / (1.0 + rank.abs())))
                    .collect()),
                Err(e) => {
                    tracing::debug!("full-text query failed ({e}); lexical leg empty");
                    Ok(Vec::new())
                }
            }
        })
    }

    fn search_by_vector(&self, embedding: &[f32], top_k: usize) -> Result<Vec<(String, f64)>> {
        if !self.vec_enabled || embedding.is_empty() {
            return Ok(Vec::new());
        }
        let candidates = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT session_id, embedding FROM session_vectors")?;
            let rows = stmt.query_map([], |row| {
                let id: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((id, blob))
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })?;

        let mut results: Vec<(String, f64)> = candidates
            .into_iter()
            .filter_map(|(id, blob)| {
                let stored = decode_embedding(&blob);
                if stored.len() != embedding.len() {
                    return None;
                }
                let distance = cosine_distance(embedding, &stored)?;
                Some((id, (1.0 - distance / 2.0).max(0.0)))
            })
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        Ok(results)
    }

    fn update_embedding(&self, session_id: &str, embedding: &[f32]) -> Result<()> {
        if !self.vec_enabled {
            return Ok(());
        }
        let blob: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM session_vectors WHERE session_id = ?1",
                [session_id],
            )?;
            tx.execute(
                "INSERT INTO session_vectors (session_id, embedding, dimensions, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![session_id, blob, embedding.len() as i64, now_ts()],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    // ── Maintenance ─────────────────────────────────────────

    fn get_stats(&self) -> Result<StoreStats> {
        self.with_conn(|conn| {
            let total_sessions: i64 =
                conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?;
            let archived_sessions: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sessions WHERE is_archived = 1",
                [],
                |r| r.get(0),
            )?;
            let total_messages: i64 =
                conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?;
            let total_tokens: i64 = conn.query_row(
                "SELECT COALESCE(SUM(token_count), 0) FROM sessions",
                [],
                |r| r.get(0),
            )?;
            let indexed_vectors = if self.vec_enabled {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM session_vectors", [], |r| r.get(0))?;
                Some(count.unsigned_abs())
            } else {
                None
            };
            Ok(StoreStats {
                total_sessions: total_sessions.unsigned_abs(),
                total_messages: total_messages.unsigned_abs(),
                total_tokens: total_tokens.unsigned_abs(),
                archived_sessions: archived_sessions.unsigned_abs(),
                vec_available: self.vec_enabled,
                indexed_vectors,
            })
        })
    }

    fn vacuum(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch("VACUUM")?;
            Ok(())
        })
    }
}

/// Decode a little-endian f32 BLOB back into a vector.
fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}

/// Cosine distance in `[0, 2]`; `None` when either vector has zero norm.
fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return None;
    }
    Some(1.0 - dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SearchQuery;

    fn session(id: &str, title: &str) -> Session {
        Session::new(id, title, None)
    }

    fn normalized(values: &[f32]) -> Vec<f32> {
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        values.iter().map(|v| v / norm).collect()
    }

    #[test]
    fn test_session_crud_round_trip() {
        let storage = SqliteStorage::open_memory().unwrap();
        let before = now_ts();
        storage
            .create_session(&session("id1", "Python Programming Tips"))
            .unwrap();

        let loaded = storage.get_session("id1").unwrap().unwrap();
        assert_eq!(loaded.title, "Python Programming Tips");
        assert!(loaded.created_at >= before && loaded.created_at <= now_ts());
        assert_eq!(loaded.created_at, loaded.updated_at);
        assert!(loaded.keywords.is_empty());
        assert_eq!(loaded.sync_status, SyncStatus::Local);

        let mut msg = Message::new("id1", Role::User, "How to write clean Python code?", 8);
        storage.add_message(&mut msg).unwrap();
        assert!(msg.id.is_some());
        let mut reply = Message::new("id1", Role::Assistant, "Use clear names.", 4);
        storage.add_message(&mut reply).unwrap();

        let messages = storage.get_messages("id1", 100, 0).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].content, "Use clear names.");
        assert!(messages[0].id.unwrap() < messages[1].id.unwrap());

        storage.delete_session("id1").unwrap();
        assert!(storage.get_session("id1").unwrap().is_none());
        assert!(storage.get_messages("id1", 100, 0).unwrap().is_empty());
    }

    #[test]
    fn test_update_refreshes_updated_at() {
        let storage = SqliteStorage::open_memory().unwrap();
        let mut s = session("id1", "Title");
        s.created_at -= 100;
        s.updated_at -= 100;
        storage.create_session(&s).unwrap();

        storage.update_session(&mut s).unwrap();
        assert!(s.updated_at >= now_ts() - 1);

        let loaded = storage.get_session("id1").unwrap().unwrap();
        assert_eq!(loaded.updated_at, s.updated_at);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");
        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage.create_session(&session("id1", "Persisted")).unwrap();
            let mut msg = Message::new("id1", Role::User, "hello", 1);
            storage.add_message(&mut msg).unwrap();
            storage.close();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        let loaded = storage.get_session("id1").unwrap().unwrap();
        assert_eq!(loaded.title, "Persisted");
        let messages = storage.get_messages("id1", 100, 0).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hello");
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.close();
        assert!(matches!(
            storage.get_session("x"),
            Err(Error::NotInitialized)
        ));
    }

    #[test]
    fn test_list_sessions_filters_archived() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.create_session(&session("a", "A")).unwrap();
        storage.create_session(&session("b", "B")).unwrap();
        storage.archive_session("a", true).unwrap();

        let active = storage.list_sessions(10, 0, Some(false)).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "b");

        let all = storage.list_sessions(10, 0, None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_recent_messages_are_time_ascending() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.create_session(&session("s", "S")).unwrap();
        for i in 0..5i64 {
            let mut msg =
                Message::with_timestamp("s", Role::User, format!("m{i}"), 1, 1000 + i);
            storage.add_message(&mut msg).unwrap();
        }

        let recent = storage.get_recent_messages("s", 3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "m2");
        assert_eq!(recent[2].content, "m4");
        assert_eq!(storage.count_messages("s").unwrap(), 5);
    }

    #[test]
    fn test_keyword_search_scores_in_unit_range() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage
            .create_session(&session("s1", "rust borrow checker"))
            .unwrap();
        storage
            .create_session(&session("s2", "python asyncio"))
            .unwrap();

        let hits = storage.search_by_keywords("rust", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "s1");
        assert!(hits[0].1 > 0.0 && hits[0].1 <= 1.0);
    }

    #[test]
    fn test_malformed_fts_query_yields_empty_list() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.create_session(&session("s1", "anything")).unwrap();
        // Unbalanced parenthesis is an FTS5 syntax error.
        let hits = storage.search_by_keywords("(anything", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_vector_search_orders_by_similarity() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.create_session(&session("near", "N")).unwrap();
        storage.create_session(&session("far", "F")).unwrap();

        let query = normalized(&[1.0, 0.0, 0.0]);
        let close = normalized(&[0.9, 0.1, 0.0]);
        let opposite = normalized(&[-1.0, 0.0, 0.0]);
        storage.update_embedding("near", &close).unwrap();
        storage.update_embedding("far", &opposite).unwrap();

        let hits = storage.search_by_vector(&query, 10).unwrap();
        assert_eq!(hits[0].0, "near");
        assert!(hits[0].1 > hits[1].1);
        // Opposite vectors sit at distance 2 → similarity 0.
        assert!(hits[1].1.abs() < 1e-6);
    }

    #[test]
    fn test_update_embedding_replaces_prior_vector() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.create_session(&session("s", "S")).unwrap();
        storage
            .update_embedding("s", &normalized(&[1.0, 0.0]))
            .unwrap();
        storage
            .update_embedding("s", &normalized(&[0.0, 1.0]))
            .unwrap();

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.indexed_vectors, Some(1));

        let hits = storage
            .search_by_vector(&normalized(&[0.0, 1.0]), 10)
            .unwrap();
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_vector_degradation_reports_capability() {
        let storage = SqliteStorage::open_memory_without_vectors().unwrap();
        storage.create_session(&session("s", "S")).unwrap();

        storage.update_embedding("s", &[1.0, 0.0]).unwrap();
        assert!(storage.search_by_vector(&[1.0, 0.0], 10).unwrap().is_empty());

        let stats = storage.get_stats().unwrap();
        assert!(!stats.vec_available);
        assert!(stats.indexed_vectors.is_none());
    }

    #[test]
    fn test_hybrid_search_excludes_session() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.create_session(&session("cur", "Message")).unwrap();
        storage.create_session(&session("other", "Message")).unwrap();

        let query = SearchQuery {
            text: Some("Message".to_string()),
            session_id_to_exclude: Some("cur".to_string()),
            ..SearchQuery::default()
        };
        let results = storage.search_hybrid(&query).unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.session.id != "cur"));
    }

    #[test]
    fn test_hybrid_search_lexical_only_uses_keyword_weight() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage
            .create_session(&session("s1", "tokio runtime internals"))
            .unwrap();

        let query = SearchQuery {
            text: Some("tokio".to_string()),
            vector_weight: 0.6,
            keyword_weight: 0.4,
            ..SearchQuery::default()
        };
        let results = storage.search_hybrid(&query).unwrap();
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert!(r.vector_score.abs() < f64::EPSILON);
        assert!((r.combined_score - 0.4 * r.keyword_score).abs() < 1e-9);
    }

    #[test]
    fn test_hybrid_search_attaches_recent_context() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.create_session(&session("s1", "embedded rust")).unwrap();
        for i in 0..5i64 {
            let mut msg =
                Message::with_timestamp("s1", Role::User, format!("m{i}"), 1, 1000 + i);
            storage.add_message(&mut msg).unwrap();
        }

        let query = SearchQuery {
            text: Some("rust".to_string()),
            context_messages: 3,
            ..SearchQuery::default()
        };
        let results = storage.search_hybrid(&query).unwrap();
        assert_eq!(results[0].context_messages.len(), 3);
        assert_eq!(results[0].context_messages[0].content, "m2");
    }

    #[test]
    fn test_cross_thread_visibility() {
        let storage = std::sync::Arc::new(SqliteStorage::open_memory().unwrap());
        storage.create_session(&session("shared", "Shared")).unwrap();

        let handle = {
            let storage = std::sync::Arc::clone(&storage);
            std::thread::spawn(move || {
                // This thread opens its own connection to the same store.
                storage.get_session("shared").unwrap().map(|s| s.title)
            })
        };
        assert_eq!(handle.join().unwrap().as_deref(), Some("Shared"));
    }
}
