//! Memory service: lifecycle and facade over storage, embeddings,
//! indexing, and recall.
//!
//! The service is a plain value constructed from a [`MemoryConfig`]; tests
//! build independent instances. State machine: Uninitialized → Ready
//! (initialize) → Closed (close) → Ready (initialize again). Message
//! ingestion always commits before indexing is even considered, so a
//! failing index pass can never lose a message.

pub mod worker;

use crate::config::MemoryConfig;
use crate::embeddings::{self, EmbeddingProvider, ProviderInfo};
use crate::error::{Error, Result};
use crate::index::IndexManager;
use crate::model::{Message, RecallResult, Role, Session};
use crate::recall::{analyzer, build_prompt_context, RecallEngine, RecallRequest};
use crate::storage::{SqliteStorage, StorageBackend, StoreStats};
use std::path::PathBuf;
use std::sync::Arc;
use worker::IndexWorker;

/// Fingerprint length used for deduplication against live context.
const DEDUP_FINGERPRINT_CHARS: usize = 100;

struct Components {
    storage: Arc<dyn StorageBackend>,
    embedding: Arc<dyn EmbeddingProvider>,
    recall: RecallEngine,
    index: Arc<IndexManager>,
    worker: IndexWorker,
}

/// Facade over the memory subsystem.
pub struct MemoryService {
    config: MemoryConfig,
    /// Explicit database path override (CLI `--db`).
    db_override: Option<PathBuf>,
    components: Option<Components>,
}

impl MemoryService {
    /// Create an uninitialized service.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            db_override: None,
            components: None,
        }
    }

    /// Create an uninitialized service with an explicit database path.
    #[must_use]
    pub fn with_db_path(config: MemoryConfig, db_path: PathBuf) -> Self {
        Self {
            config,
            db_override: Some(db_path),
            components: None,
        }
    }

    /// Open the store, load the embedding provider, and wire the engines.
    ///
    /// Idempotent; a closed service can be re-initialized.
    ///
    /// # Errors
    ///
    /// Returns an error when the storage backend cannot be opened. An
    /// unusable embedding provider is not an error (it degrades to mock).
    pub fn initialize(&mut self) -> Result<()> {
        if self.components.is_some() {
            return Ok(());
        }

        let storage: Arc<dyn StorageBackend> = match self.config.storage.backend.as_str() {
            "sqlite" => {
                let path = self.config.resolve_db_path(self.db_override.as_deref());
                Arc::new(SqliteStorage::open(&path)?)
            }
            other => {
                return Err(Error::Config(format!("unsupported storage backend: {other}")));
            }
        };

        let embedding = embeddings::create_provider(&self.config.embedding);
        let recall = RecallEngine::new(Arc::clone(&storage), Some(Arc::clone(&embedding)));
        let index = Arc::new(IndexManager::new(
            Arc::clone(&storage),
            Some(Arc::clone(&embedding)),
        ));
        let worker = IndexWorker::spawn(Arc::clone(&index));

        self.components = Some(Components {
            storage,
            embedding,
            recall,
            index,
            worker,
        });
        Ok(())
    }

    /// Drain background work and release every handle.
    pub fn close(&mut self) {
        if let Some(mut components) = self.components.take() {
            components.worker.shutdown();
            components.storage.close();
        }
    }

    /// Whether the service is in the Ready state.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.components.is_some()
    }

    fn ready(&self) -> Result<&Components> {
        self.components.as_ref().ok_or(Error::NotInitialized)
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Metadata of the active embedding provider.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before `initialize()`.
    pub fn embedding_info(&self) -> Result<ProviderInfo> {
        Ok(self.ready()?.embedding.info())
    }

    /// Direct access to the storage backend (importer, commands).
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before `initialize()`.
    pub fn storage(&self) -> Result<Arc<dyn StorageBackend>> {
        Ok(Arc::clone(&self.ready()?.storage))
    }

    // ── Session management ──────────────────────────────────

    /// Create a session with an externally assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (duplicate id included).
    pub fn create_session(
        &self,
        session_id: &str,
        title: &str,
        work_dir: Option<String>,
    ) -> Result<Session> {
        let session = Session::new(session_id, title, work_dir);
        self.ready()?.storage.create_session(&session)?;
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `NotInitialized` before `initialize()` or on storage failure.
    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.ready()?.storage.get_session(session_id)
    }

    /// # Errors
    ///
    /// Returns `NotInitialized` before `initialize()` or on storage failure.
    pub fn list_sessions(
        &self,
        limit: usize,
        offset: usize,
        archived: Option<bool>,
    ) -> Result<Vec<Session>> {
        self.ready()?.storage.list_sessions(limit, offset, archived)
    }

    /// # Errors
    ///
    /// Returns `NotInitialized` before `initialize()` or on storage failure.
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        self.ready()?.storage.delete_session(session_id)
    }

    /// # Errors
    ///
    /// Returns `NotInitialized` before `initialize()` or on storage failure.
    pub fn archive_session(&self, session_id: &str, archived: bool) -> Result<()> {
        self.ready()?.storage.archive_session(session_id, archived)
    }

    /// # Errors
    ///
    /// Returns `NotInitialized` before `initialize()` or on storage failure.
    pub fn get_messages(&self, session_id: &str, limit: usize, offset: usize) -> Result<Vec<Message>> {
        self.ready()?.storage.get_messages(session_id, limit, offset)
    }

    /// Append a message, then schedule background indexing when the
    /// re-index policy fires. The append commits unconditionally; indexing
    /// failures never surface here.
    ///
    /// # Errors
    ///
    /// Returns an error only when the append itself fails.
    pub fn add_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        token_count: i64,
    ) -> Result<Message> {
        let components = self.ready()?;
        let mut message = Message::new(session_id, role, content, token_count);
        components.storage.add_message(&mut message)?;

        match components.index.should_index(session_id) {
            Ok(true) => components.worker.enqueue(session_id),
            Ok(false) => {}
            Err(e) => tracing::warn!("re-index check failed for {session_id}: {e}"),
        }

        Ok(message)
    }

    // ── Recall ──────────────────────────────────────────────

    /// Recall sessions related to a query or conversational context.
    ///
    /// The query is classified to pick adaptive hybrid weights, results are
    /// deduplicated against `active_context` (texts already visible to the
    /// caller), and the caller's current session never appears.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be searched.
    pub fn recall(
        &self,
        context_text: &str,
        current_session_id: Option<&str>,
        top_k: Option<usize>,
        active_context: &[String],
    ) -> Result<Vec<RecallResult>> {
        let components = self.ready()?;
        let recall_config = &self.config.recall;
        // The default class carries no signal about the query shape, so it
        // falls back to the configured weights.
        let (vector_weight, keyword_weight) = match analyzer::classify(context_text) {
            analyzer::QueryClass::Technical => {
                (recall_config.vector_weight, recall_config.keyword_weight)
            }
            class => class.weights(),
        };

        let embedding = components.embedding.embed(context_text).map_or_else(
            |e| {
                tracing::warn!("query embedding failed ({e}); lexical leg only");
                None
            },
            Some,
        );

        let request = RecallRequest {
            query_text: Some(context_text.chars().take(200).collect()),
            query_embedding: embedding,
            current_session_id: current_session_id.map(str::to_string),
            top_k: top_k.unwrap_or(recall_config.max_results),
            min_score: recall_config.min_similarity,
            vector_weight,
            keyword_weight,
            time_decay_factor: recall_config.time_decay_factor,
            context_messages: recall_config.max_messages_per_session,
        };

        let results = components.recall.recall(&request)?;
        Ok(filter_known_context(results, active_context))
    }

    /// Recall and render the prompt-context block in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be searched.
    pub fn get_recall_context(
        &self,
        context_text: &str,
        current_session_id: Option<&str>,
        max_tokens: usize,
    ) -> Result<String> {
        let results = self.recall(context_text, current_session_id, None, &[])?;
        Ok(build_prompt_context(&results, max_tokens))
    }

    // ── Indexing ────────────────────────────────────────────

    /// Index one session in the foreground.
    ///
    /// # Errors
    ///
    /// Returns an error if the index write-back fails.
    pub fn index_session(&self, session_id: &str, force: bool) -> Result<bool> {
        self.ready()?.index.index_session(session_id, force)
    }

    /// Index all not-yet-indexed sessions; returns how many were indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session list cannot be read.
    pub fn batch_index(&self, limit: usize) -> Result<usize> {
        self.ready()?.index.batch_index(limit)
    }

    // ── Statistics ──────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `NotInitialized` before `initialize()` or on storage failure.
    pub fn get_stats(&self) -> Result<StoreStats> {
        self.ready()?.storage.get_stats()
    }

    /// # Errors
    ///
    /// Returns `NotInitialized` before `initialize()` or on storage failure.
    pub fn vacuum(&self) -> Result<()> {
        self.ready()?.storage.vacuum()
    }
}

impl Drop for MemoryService {
    fn drop(&mut self) {
        self.close();
    }
}

/// Drop results whose title or context messages are already present in the
/// caller's live history. Matching is substring containment of case-folded
/// 100-char fingerprints.
fn filter_known_context(
    results: Vec<RecallResult>,
    active_context: &[String],
) -> Vec<RecallResult> {
    if active_context.is_empty() {
        return results;
    }
    let history: Vec<String> = active_context.iter().map(|s| s.to_lowercase()).collect();

    results
        .into_iter()
        .filter(|result| {
            let mut fingerprints = vec![fingerprint(&result.session.title)];
            fingerprints.extend(result.context_messages.iter().map(|m| fingerprint(&m.content)));
            !fingerprints.iter().any(|fp| {
                !fp.is_empty() && history.iter().any(|entry| entry.contains(fp.as_str()))
            })
        })
        .collect()
}

fn fingerprint(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .take(DEDUP_FINGERPRINT_CHARS)
        .collect()
}
