//! Index manager: derives keywords, summary, token totals, and the session
//! vector from a session's messages.
//!
//! Indexing mutates only derived fields; messages are never touched. A
//! failed embedding step is logged and recovered — the lexical index
//! write-back has already committed by then, so ingestion is never lost.

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::model::{now_ts, Message, Role, Session};
use crate::storage::StorageBackend;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

/// Hard cap on messages loaded per indexing pass.
const INDEX_MESSAGE_CAP: usize = 1000;

/// Keywords kept per session.
const MAX_KEYWORDS: usize = 10;

/// Per-message preview length used in summaries and embedding payloads.
const PREVIEW_CHARS: usize = 100;

/// Total summary length cap.
const SUMMARY_CHARS: usize = 200;

/// Re-index when the session has been quiet this long (seconds).
const REINDEX_AFTER_SECS: i64 = 600;

static IDENT_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[A-Za-z_][A-Za-z0-9_]+").expect("static regex"));

// Maximal runs capped at 8 so multi-ideograph compound terms survive whole.
static CJK_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[一-龥]{2,8}").expect("static regex"));

/// Bilingual stop list: English function words plus common Chinese
/// pronouns and particles. Matched case-folded.
static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "a", "an", "is", "are", "was", "were", "be", "been", "have", "has", "had", "do",
        "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
        "can", "need", "dare", "ought", "used", "to", "of", "in", "for", "on", "with", "at",
        "by", "from", "as", "into", "through", "during", "before", "after", "above", "below",
        "between", "and", "or", "not", "this", "that", "it", "its", "how", "what", "when",
        "where", "why", "who", "you", "your", "we", "our", "they", "their", "i", "me", "my",
        "he", "she", "his", "her", "them", "us", "about", "there", "here", "then", "than",
        "so", "but", "if", "else", "just", "also", "very", "more", "most", "some", "any",
        "all", "no", "nor", "only", "own", "same", "such", "too", "up", "down", "out", "off",
        "over", "under", "again", "further", "once", "please", "want", "like", "get", "make",
        "use", "using", "work", "works",
        // Chinese pronouns and particles
        "你", "我", "他", "她", "它", "的", "了", "在", "是", "有", "和", "就", "不", "人",
        "都", "一", "一个", "上", "也", "很", "到", "说", "要", "去", "会", "着", "没有",
        "看", "好", "自己", "这", "那", "怎么", "什么", "吗", "呢", "吧", "啊", "我们",
        "你们", "他们", "这个", "那个", "可以", "这样", "那样",
    ]
    .into_iter()
    .collect()
});

/// Derives and writes back a session's index fields.
pub struct IndexManager {
    storage: Arc<dyn StorageBackend>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
}

impl IndexManager {
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        embedding: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self { storage, embedding }
    }

    /// Index one session: keywords, summary, token total, vector.
    ///
    /// With `force = false` the re-index policy is consulted first and the
    /// pass is skipped when nothing warrants it. Returns whether indexing
    /// ran.
    ///
    /// # Errors
    ///
    /// Returns an error when the session metadata cannot be written back.
    /// Embedding failures are logged and recovered; the next policy tick
    /// retries.
    pub fn index_session(&self, session_id: &str, force: bool) -> Result<bool> {
        if !force && !self.should_index(session_id)? {
            return Ok(false);
        }

        let Some(mut session) = self.storage.get_session(session_id)? else {
            return Ok(false);
        };
        let messages = self.storage.get_messages(session_id, INDEX_MESSAGE_CAP, 0)?;
        if messages.is_empty() {
            return Ok(false);
        }

        session.keywords = extract_keywords(&messages, MAX_KEYWORDS);
        session.summary = Some(generate_summary(&messages, SUMMARY_CHARS));
        session.token_count = messages.iter().map(|m| m.token_count).sum();

        // Commits the lexical index via the FTS triggers.
        self.storage.update_session(&mut session)?;

        if let Some(provider) = &self.embedding {
            let payload = embedding_payload(&session, &messages);
            match provider.embed(&payload) {
                Ok(vector) => self.storage.update_embedding(session_id, &vector)?,
                Err(e) => {
                    tracing::warn!("embedding failed for session {session_id}: {e}");
                }
            }
        }

        Ok(true)
    }

    /// Re-index policy: never indexed, every 5th message, or quiet for
    /// more than ten minutes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn should_index(&self, session_id: &str) -> Result<bool> {
        let Some(session) = self.storage.get_session(session_id)? else {
            return Ok(false);
        };

        if session.keywords.is_empty() {
            return Ok(true);
        }

        let count = self.storage.count_messages(session_id)?;
        if count > 0 && count % 5 == 0 {
            return Ok(true);
        }

        Ok(now_ts() - session.updated_at > REINDEX_AFTER_SECS)
    }

    /// Index every not-yet-indexed session, up to `limit`. Returns how many
    /// sessions were indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session list cannot be read.
    pub fn batch_index(&self, limit: usize) -> Result<usize> {
        let sessions = self.storage.list_sessions(limit, 0, None)?;
        let mut count = 0;
        for session in sessions {
            if session.keywords.is_empty() {
                match self.index_session(&session.id, false) {
                    Ok(true) => count += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!("batch index skipped {}: {e}", session.id),
                }
            }
        }
        Ok(count)
    }
}

/// Extract up to `max` keywords from the user messages.
///
/// Identifier-like tokens (≥2 chars) and CJK runs are counted by frequency
/// after stop-word removal; ties keep first-seen order.
#[must_use]
pub fn extract_keywords(messages: &[Message], max: usize) -> Vec<String> {
    let user_text: String = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    if user_text.is_empty() {
        return Vec::new();
    }

    let tokens = IDENT_RE
        .find_iter(&user_text)
        .chain(CJK_RE.find_iter(&user_text))
        .map(|m| m.as_str());

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for token in tokens {
        let folded = token.to_lowercase();
        if STOP_WORDS.contains(folded.as_str()) || token.chars().count() < 2 {
            continue;
        }
        let entry = counts.entry(token.to_string()).or_insert(0);
        if *entry == 0 {
            order.push(token.to_string());
        }
        *entry += 1;
    }

    // Stable sort keeps first-seen order among equal counts.
    order.sort_by_key(|word| std::cmp::Reverse(counts[word]));
    order.truncate(max);
    order
}

/// Build the session summary: the first up to three user messages, each
/// previewed, joined with ` | `, the whole capped at `max_chars`.
#[must_use]
pub fn generate_summary(messages: &[Message], max_chars: usize) -> String {
    let previews: Vec<String> = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .take(3)
        .map(|m| truncate_chars(&m.content, PREVIEW_CHARS))
        .collect();

    if previews.is_empty() {
        return "Empty session".to_string();
    }

    truncate_chars(&previews.join(" | "), max_chars)
}

/// Text embedded for the session vector: title, summary, keywords, and the
/// first five user-message previews.
#[must_use]
pub fn embedding_payload(session: &Session, messages: &[Message]) -> String {
    let mut parts: Vec<String> = vec![session.title.clone()];
    if let Some(summary) = &session.summary {
        parts.push(summary.clone());
    }
    parts.extend(session.keywords.iter().cloned());
    parts.extend(
        messages
            .iter()
            .filter(|m| m.role == Role::User)
            .take(5)
            .map(|m| truncate_chars(&m.content, PREVIEW_CHARS)),
    );
    parts.join(" ")
}

/// Truncate to at most `max` characters, ellipsis included in the budget.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SqliteStorage, StorageBackend};

    fn msg(role: Role, content: &str) -> Message {
        Message::new("s", role, content, content.len() as i64 / 4)
    }

    fn indexed_store() -> (Arc<SqliteStorage>, IndexManager) {
        let storage = Arc::new(SqliteStorage::open_memory().unwrap());
        let manager = IndexManager::new(
            Arc::clone(&storage) as Arc<dyn StorageBackend>,
            Some(std::sync::Arc::new(crate::embeddings::HashEmbedding::new(8))),
        );
        (storage, manager)
    }

    #[test]
    fn keywords_mix_identifiers_and_cjk() {
        let messages = vec![msg(Role::User, "分布式系统 concurrent programming 分布式系统 的")];
        let keywords = extract_keywords(&messages, 10);
        assert!(keywords.contains(&"分布式系统".to_string()));
        assert!(keywords.contains(&"concurrent".to_string()));
        assert!(!keywords.iter().any(|k| k == "的"));
        // Repeated term ranks first.
        assert_eq!(keywords[0], "分布式系统");
    }

    #[test]
    fn keywords_only_from_user_messages() {
        let messages = vec![
            msg(Role::User, "postgres indexing"),
            msg(Role::Assistant, "kubernetes kubernetes kubernetes"),
        ];
        let keywords = extract_keywords(&messages, 10);
        assert!(keywords.contains(&"postgres".to_string()));
        assert!(!keywords.contains(&"kubernetes".to_string()));
    }

    #[test]
    fn keyword_ties_keep_first_seen_order() {
        let messages = vec![msg(Role::User, "zebra apple zebra apple mango")];
        let keywords = extract_keywords(&messages, 10);
        assert_eq!(keywords[0], "zebra");
        assert_eq!(keywords[1], "apple");
        assert_eq!(keywords[2], "mango");
    }

    #[test]
    fn keywords_are_capped() {
        let text = (0..30).map(|i| format!("word{i:02}")).collect::<Vec<_>>().join(" ");
        let keywords = extract_keywords(&[msg(Role::User, &text)], 10);
        assert_eq!(keywords.len(), 10);
        assert!(keywords.iter().all(|k| k.chars().count() >= 2));
    }

    #[test]
    fn summary_joins_first_three_user_messages() {
        let messages = vec![
            msg(Role::User, "first question"),
            msg(Role::Assistant, "an answer"),
            msg(Role::User, "second question"),
            msg(Role::User, "third question"),
            msg(Role::User, "fourth question"),
        ];
        let summary = generate_summary(&messages, 200);
        assert_eq!(summary, "first question | second question | third question");
    }

    #[test]
    fn summary_never_exceeds_cap() {
        let long = "x".repeat(150);
        let messages = vec![
            msg(Role::User, &long),
            msg(Role::User, &long),
            msg(Role::User, &long),
        ];
        let summary = generate_summary(&messages, 200);
        assert!(summary.chars().count() <= 200);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn summary_of_assistant_only_session() {
        let messages = vec![msg(Role::Assistant, "hello")];
        assert_eq!(generate_summary(&messages, 200), "Empty session");
    }

    #[test]
    fn index_session_writes_derived_fields() {
        let (storage, manager) = indexed_store();
        storage
            .create_session(&Session::new("s", "Distributed Systems", None))
            .unwrap();
        let mut m = msg(Role::User, "分布式系统 concurrent programming 分布式系统");
        storage.add_message(&mut m).unwrap();

        assert!(manager.index_session("s", true).unwrap());

        let session = storage.get_session("s").unwrap().unwrap();
        assert!(session.keywords.contains(&"分布式系统".to_string()));
        assert!(session.keywords.len() <= 10);
        assert!(session
            .summary
            .as_deref()
            .unwrap()
            .starts_with("分布式系统 concurrent programming"));
        assert_eq!(session.token_count, m.token_count);

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.indexed_vectors, Some(1));
    }

    #[test]
    fn index_session_without_messages_is_a_no_op() {
        let (storage, manager) = indexed_store();
        storage.create_session(&Session::new("s", "Empty", None)).unwrap();
        assert!(!manager.index_session("s", true).unwrap());
    }

    #[test]
    fn index_unknown_session_returns_false() {
        let (_storage, manager) = indexed_store();
        assert!(!manager.index_session("missing", true).unwrap());
    }

    #[test]
    fn should_index_policy() {
        let (storage, manager) = indexed_store();
        storage.create_session(&Session::new("s", "S", None)).unwrap();
        let mut m = msg(Role::User, "rust ownership rules");
        storage.add_message(&mut m).unwrap();

        // Never indexed → true.
        assert!(manager.should_index("s").unwrap());
        manager.index_session("s", true).unwrap();
        // One message, freshly indexed → false.
        assert!(!manager.should_index("s").unwrap());

        for _ in 0..4 {
            let mut extra = msg(Role::User, "more rust");
            storage.add_message(&mut extra).unwrap();
        }
        // Five messages → multiple-of-5 trigger.
        assert!(manager.should_index("s").unwrap());

        // Sixth message: off the cadence and recently indexed → false.
        manager.index_session("s", true).unwrap();
        let mut extra = msg(Role::User, "one more");
        storage.add_message(&mut extra).unwrap();
        assert!(!manager.should_index("s").unwrap());
    }

    #[test]
    fn batch_index_touches_only_unindexed_sessions() {
        let (storage, manager) = indexed_store();
        for id in ["a", "b"] {
            storage.create_session(&Session::new(id, id, None)).unwrap();
            let mut m = Message::new(id, Role::User, "tokio channels", 3);
            storage.add_message(&mut m).unwrap();
        }
        manager.index_session("a", true).unwrap();

        assert_eq!(manager.batch_index(100).unwrap(), 1);
        let b = storage.get_session("b").unwrap().unwrap();
        assert!(!b.keywords.is_empty());
    }
}
