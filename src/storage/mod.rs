//! Storage layer: durable schema, CRUD, and search primitives.
//!
//! [`StorageBackend`] is the capability set every backend must provide.
//! The hybrid search that fuses the lexical and vector legs has a default
//! implementation here; backends may override it with something smarter.

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::Result;
use crate::model::{Message, RecallResult, SearchQuery, Session};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Store totals and capability flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_sessions: u64,
    pub total_messages: u64,
    pub total_tokens: u64,
    pub archived_sessions: u64,
    /// Whether the vector leg is usable at all.
    pub vec_available: bool,
    /// Absent when the store cannot index vectors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_vectors: Option<u64>,
}

/// Capability set over a single durable store.
///
/// All mutations are atomic with respect to readers on other threads;
/// writers serialize behind the engine's write lock.
pub trait StorageBackend: Send + Sync {
    /// Idempotent open with schema migration.
    fn initialize(&self) -> Result<()>;

    /// Release all handles. A closed store can be re-initialized.
    fn close(&self);

    // ── Session operations ──────────────────────────────────

    fn create_session(&self, session: &Session) -> Result<()>;

    fn get_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Write back a session's fields, refreshing `updated_at` to now.
    fn update_session(&self, session: &mut Session) -> Result<()>;

    /// Sessions ordered by `updated_at` descending.
    fn list_sessions(
        &self,
        limit: usize,
        offset: usize,
        archived: Option<bool>,
    ) -> Result<Vec<Session>>;

    fn archive_session(&self, session_id: &str, archived: bool) -> Result<()>;

    /// Delete a session and, atomically, all of its messages and vector.
    fn delete_session(&self, session_id: &str) -> Result<()>;

    // ── Message operations ──────────────────────────────────

    /// Append a message, returning its store-assigned id.
    fn add_message(&self, message: &mut Message) -> Result<i64>;

    /// Messages in time-ascending order.
    fn get_messages(&self, session_id: &str, limit: usize, offset: usize)
    -> Result<Vec<Message>>;

    /// The last `n` messages, returned time-ascending.
    fn get_recent_messages(&self, session_id: &str, n: usize) -> Result<Vec<Message>>;

    fn count_messages(&self, session_id: &str) -> Result<usize>;

    // ── Search primitives ───────────────────────────────────

    /// Full-text search; scores mapped to `[0, 1]` via `1 / (1 + |rank|)`.
    /// A malformed query yields an empty list, never an error.
    fn search_by_keywords(&self, query: &str, top_k: usize) -> Result<Vec<(String, f64)>>;

    /// Vector search; cosine distance in `[0, 2]` mapped to similarity
    /// `max(0, 1 - distance / 2)`. Empty when vectors are unavailable.
    fn search_by_vector(&self, embedding: &[f32], top_k: usize) -> Result<Vec<(String, f64)>>;

    /// Replace any prior vector for the session atomically. A no-op when
    /// vectors are unavailable.
    fn update_embedding(&self, session_id: &str, embedding: &[f32]) -> Result<()>;

    // ── Maintenance ─────────────────────────────────────────

    fn get_stats(&self) -> Result<StoreStats>;

    /// Compaction hook.
    fn vacuum(&self) -> Result<()>;

    // ── Hybrid search ───────────────────────────────────────

    /// Fuse the lexical and vector legs into ranked [`RecallResult`]s.
    ///
    /// Both sub-searches run with `top_k * 2`; sub-scores are capped at 1;
    /// the combined score is `vector_weight * v + keyword_weight * k`.
    /// `session_id_to_exclude` never appears in the output.
    fn search_hybrid(&self, query: &SearchQuery) -> Result<Vec<RecallResult>> {
        let mut by_id: HashMap<String, RecallResult> = HashMap::new();
        let fetch = query.top_k * 2;

        if let Some(text) = query.text.as_deref().filter(|t| !t.is_empty()) {
            for (session_id, score) in self.search_by_keywords(text, fetch)? {
                if query.session_id_to_exclude.as_deref() == Some(session_id.as_str()) {
                    continue;
                }
                if let Some(result) = by_id.get_mut(&session_id) {
                    result.keyword_score = result.keyword_score.max(score);
                } else if let Some(session) = self.get_session(&session_id)? {
                    let context =
                        self.get_recent_messages(&session_id, query.context_messages)?;
                    let mut result = RecallResult::new(session, context);
                    result.keyword_score = score;
                    by_id.insert(session_id, result);
                }
            }
        }

        if let Some(embedding) = query.embedding.as_deref() {
            for (session_id, score) in self.search_by_vector(embedding, fetch)? {
                if query.session_id_to_exclude.as_deref() == Some(session_id.as_str()) {
                    continue;
                }
                if let Some(result) = by_id.get_mut(&session_id) {
                    result.vector_score = result.vector_score.max(score);
                } else if let Some(session) = self.get_session(&session_id)? {
                    let context =
                        self.get_recent_messages(&session_id, query.context_messages)?;
                    let mut result = RecallResult::new(session, context);
                    result.vector_score = score;
                    by_id.insert(session_id, result);
                }
            }
        }

        let mut results: Vec<RecallResult> = by_id.into_values().collect();
        for result in &mut results {
            let vector = result.vector_score.min(1.0);
            let keyword = result.keyword_score.min(1.0);
            result.combined_score =
                vector * query.vector_weight + keyword * query.keyword_weight;
        }

        results.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(query.top_k);
        Ok(results)
    }
}
