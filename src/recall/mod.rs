//! Recall engine: hybrid retrieval over past sessions.
//!
//! A recall request resolves a query vector if needed, runs the store's
//! hybrid search (excluding the caller's current session), filters on the
//! pre-decay combined score, applies exponential time decay, and returns
//! the top results. [`build_prompt_context`] renders ranked results into a
//! budgeted text block for prompt injection.

pub mod analyzer;

pub use analyzer::{classify, QueryClass};

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::model::{now_ts, RecallResult, SearchQuery};
use crate::storage::StorageBackend;
use std::sync::Arc;

/// Lexical-leg prefix taken from a conversational context.
const CONTEXT_LEXICAL_CHARS: usize = 200;

/// Per-message preview length in the prompt context block.
const CONTEXT_PREVIEW_CHARS: usize = 200;

/// Parameters for one recall.
#[derive(Debug, Clone)]
pub struct RecallRequest {
    pub query_text: Option<String>,
    pub query_embedding: Option<Vec<f32>>,
    pub current_session_id: Option<String>,
    pub top_k: usize,
    /// Threshold on the pre-decay combined score.
    pub min_score: f64,
    pub vector_weight: f64,
    pub keyword_weight: f64,
    /// λ in `exp(-λ · age_days)`.
    pub time_decay_factor: f64,
    pub context_messages: usize,
}

impl Default for RecallRequest {
    fn default() -> Self {
        Self {
            query_text: None,
            query_embedding: None,
            current_session_id: None,
            top_k: 5,
            min_score: 0.0,
            vector_weight: 0.6,
            keyword_weight: 0.4,
            time_decay_factor: 0.001,
            context_messages: 3,
        }
    }
}

/// Hybrid retrieval over the store.
pub struct RecallEngine {
    storage: Arc<dyn StorageBackend>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
}

impl RecallEngine {
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        embedding: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self { storage, embedding }
    }

    /// Execute a recall.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be searched. A failed query
    /// embedding only degrades the vector leg.
    pub fn recall(&self, request: &RecallRequest) -> Result<Vec<RecallResult>> {
        let mut query_embedding = request.query_embedding.clone();
        if query_embedding.is_none() {
            if let (Some(text), Some(provider)) = (&request.query_text, &self.embedding) {
                match provider.embed(text) {
                    Ok(vector) => query_embedding = Some(vector),
                    Err(e) => tracing::warn!("query embedding failed ({e}); lexical leg only"),
                }
            }
        }

        let search = SearchQuery {
            text: request.query_text.clone(),
            embedding: query_embedding,
            session_id_to_exclude: request.current_session_id.clone(),
            // Over-fetch; decay and the threshold prune below.
            top_k: request.top_k * 2,
            vector_weight: request.vector_weight,
            keyword_weight: request.keyword_weight,
            context_messages: request.context_messages,
        };

        let mut results = self.storage.search_hybrid(&search)?;

        results.retain(|r| r.combined_score >= request.min_score);
        apply_time_decay(&mut results, request.time_decay_factor, now_ts());

        results.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(request.top_k);
        Ok(results)
    }

    /// Recall from a conversation context rather than an explicit query:
    /// the lexical leg sees only the first 200 characters, the embedding
    /// leg the full text.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be searched.
    pub fn recall_for_session(
        &self,
        session_id: &str,
        context_text: &str,
        top_k: usize,
    ) -> Result<Vec<RecallResult>> {
        let embedding = self.embedding.as_ref().and_then(|provider| {
            provider
                .embed(context_text)
                .map_err(|e| tracing::warn!("context embedding failed: {e}"))
                .ok()
        });

        self.recall(&RecallRequest {
            query_text: Some(context_text.chars().take(CONTEXT_LEXICAL_CHARS).collect()),
            query_embedding: embedding,
            current_session_id: Some(session_id.to_string()),
            top_k,
            ..RecallRequest::default()
        })
    }
}

/// Multiply each combined score by `exp(-λ · age_days)`.
fn apply_time_decay(results: &mut [RecallResult], lambda: f64, now: i64) {
    for result in results {
        let age_days = (now - result.session.updated_at).max(0) as f64 / 86_400.0;
        result.combined_score *= (-lambda * age_days).exp();
    }
}

/// Render ranked results into a prompt-context block within a rough token
/// budget (1 token ≈ 4 characters). Emits a truncation marker when the
/// budget cuts results off.
#[must_use]
pub fn build_prompt_context(results: &[RecallResult], max_tokens: usize) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut lines: Vec<String> = vec![
        "[memory] Related past conversations that may help:".to_string(),
        String::new(),
    ];
    let mut used_tokens = 0usize;

    for (i, result) in results.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(result.session.updated_at, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let mut section: Vec<String> = vec![
            format!(
                "--- Related conversation #{} ({}) [{}] ---",
                i + 1,
                result.session.title,
                date
            ),
            format!("Relevance: {:.1}%", result.combined_score * 100.0),
            String::new(),
        ];
        for message in &result.context_messages {
            let preview: String = preview_chars(&message.content, CONTEXT_PREVIEW_CHARS);
            section.push(format!("{}: {}", message.role, preview));
        }
        section.push(String::new());

        let section_tokens = section.iter().map(String::len).sum::<usize>() / 4;
        if used_tokens + section_tokens > max_tokens {
            lines.push("... (further related conversations omitted) ...".to_string());
            break;
        }

        lines.extend(section);
        used_tokens += section_tokens;
    }

    lines.push("--- End of related conversations ---".to_string());
    lines.push(String::new());
    lines.join("\n")
}

fn preview_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max).collect();
        format!("{kept}...")
    }
}
