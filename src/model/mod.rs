//! Data types for the memory store.
//!
//! A [`Session`] is a logical conversation holding ordered [`Message`]s plus
//! the derived index fields (summary, keywords, vector). [`RecallResult`] and
//! [`SearchQuery`] are the transient types exchanged with the recall engine.

use serde::{Deserialize, Serialize};

/// Current unix time in seconds.
#[must_use]
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Sync lifecycle of a session.
///
/// Reserved: the fields are persisted verbatim but no sync backend acts
/// on them; all states are treated as visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Local,
    Syncing,
    Synced,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Local => "local",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "syncing" => Ok(Self::Syncing),
            "synced" => Ok(Self::Synced),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

/// A logical conversation with derived index fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque, externally assigned identifier.
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    /// Up to 10 duplicate-free keywords; empty iff never indexed.
    pub keywords: Vec<String>,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds; refreshed on every update.
    pub updated_at: i64,
    /// Denormalized sum of the messages' token counts.
    pub token_count: i64,
    pub work_dir: Option<String>,
    pub is_archived: bool,
    pub sync_status: SyncStatus,
    pub sync_version: i64,
}

impl Session {
    /// Create a fresh session stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, work_dir: Option<String>) -> Self {
        let now = now_ts();
        Self {
            id: id.into(),
            title: title.into(),
            summary: None,
            keywords: Vec::new(),
            created_at: now,
            updated_at: now,
            token_count: 0,
            work_dir,
            is_archived: false,
            sync_status: SyncStatus::Local,
            sync_version: 1,
        }
    }
}

/// One immutable turn within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Store-scoped auto-assigned id; `None` until persisted.
    pub id: Option<i64>,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub token_count: i64,
    /// Unix seconds.
    pub timestamp: i64,
    pub has_code: bool,
    pub code_language: Option<String>,
}

impl Message {
    /// Create an unsaved message stamped with the current time.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        token_count: i64,
    ) -> Self {
        Self {
            id: None,
            session_id: session_id.into(),
            role,
            content: content.into(),
            token_count,
            timestamp: now_ts(),
            has_code: false,
            code_language: None,
        }
    }

    /// Same as [`Message::new`] with an explicit timestamp (importer path).
    #[must_use]
    pub fn with_timestamp(
        session_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        token_count: i64,
        timestamp: i64,
    ) -> Self {
        let mut msg = Self::new(session_id, role, content, token_count);
        msg.timestamp = timestamp;
        msg
    }
}

/// One recalled session with its scores and context preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallResult {
    pub session: Session,
    /// Cosine similarity mapped to `[0, 1]`.
    pub vector_score: f64,
    /// BM25-like rank mapped to `[0, 1]`.
    pub keyword_score: f64,
    /// Weighted sum of the bounded sub-scores, then time-decayed.
    pub combined_score: f64,
    /// Most recent messages, time-ascending.
    pub context_messages: Vec<Message>,
}

impl RecallResult {
    #[must_use]
    pub fn new(session: Session, context_messages: Vec<Message>) -> Self {
        Self {
            session,
            vector_score: 0.0,
            keyword_score: 0.0,
            combined_score: 0.0,
            context_messages,
        }
    }
}

/// Parameters for one hybrid search against the store.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub session_id_to_exclude: Option<String>,
    pub top_k: usize,
    pub vector_weight: f64,
    pub keyword_weight: f64,
    /// How many recent messages to attach per result.
    pub context_messages: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: None,
            embedding: None,
            session_id_to_exclude: None,
            top_k: 5,
            vector_weight: 0.6,
            keyword_weight: 0.4,
            context_messages: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_unindexed() {
        let s = Session::new("id1", "Title", None);
        assert!(s.keywords.is_empty());
        assert!(s.summary.is_none());
        assert_eq!(s.created_at, s.updated_at);
        assert_eq!(s.sync_status, SyncStatus::Local);
        assert_eq!(s.sync_version, 1);
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::User, Role::Assistant, Role::System] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("robot".parse::<Role>().is_err());
    }

    #[test]
    fn message_timestamp_defaults_to_now() {
        let before = now_ts();
        let m = Message::new("s", Role::User, "hi", 2);
        assert!(m.timestamp >= before);
        assert!(m.id.is_none());
        assert!(!m.has_code);
    }

    #[test]
    fn search_query_defaults_match_recall_config() {
        let q = SearchQuery::default();
        assert!((q.vector_weight - 0.6).abs() < f64::EPSILON);
        assert!((q.keyword_weight - 0.4).abs() < f64::EPSILON);
        assert_eq!(q.top_k, 5);
        assert_eq!(q.context_messages, 3);
    }
}
