//! Error types for the Mnemo CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (1=uninitialized, 2=arguments, 3=storage, 4=embedding)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Mnemo operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Agents match on the string; shell scripts on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Lifecycle (exit 1)
    NotInitialized,

    // Arguments / lookup (exit 2)
    SessionNotFound,
    MessageNotFound,
    InvalidArgument,
    ConfigError,

    // Storage (exit 3)
    StorageFailure,
    IoError,
    JsonError,

    // Embedding (exit 4)
    EmbeddingUnavailable,

    // Derived-data failures recovered locally; exit 1 if they ever surface
    IndexingFailure,
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::MessageNotFound => "MESSAGE_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ConfigError => "CONFIG_ERROR",
            Self::StorageFailure => "STORAGE_FAILURE",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::EmbeddingUnavailable => "EMBEDDING_UNAVAILABLE",
            Self::IndexingFailure => "INDEXING_FAILURE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-4).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::NotInitialized | Self::IndexingFailure | Self::InternalError => 1,
            Self::SessionNotFound
            | Self::MessageNotFound
            | Self::InvalidArgument
            | Self::ConfigError => 2,
            Self::StorageFailure | Self::IoError | Self::JsonError => 3,
            Self::EmbeddingUnavailable => 4,
        }
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Mnemo operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Memory service not initialized: run `mnemo init` first")]
    NotInitialized,

    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    #[error("Message not found: {id}")]
    MessageNotFound { id: i64 },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Indexing failed for session {session_id}: {reason}")]
    Indexing { session_id: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a not-found error with an owned id.
    #[must_use]
    pub fn session_not_found(id: &str) -> Self {
        Self::SessionNotFound { id: id.to_string() }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::SessionNotFound { .. } => ErrorCode::SessionNotFound,
            Self::MessageNotFound { .. } => ErrorCode::MessageNotFound,
            Self::Storage(_) => ErrorCode::StorageFailure,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Embedding(_) => ErrorCode::EmbeddingUnavailable,
            Self::Indexing { .. } => ErrorCode::IndexingFailure,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for agents and humans.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `mnemo init` to create the memory store".to_string())
            }

            Self::SessionNotFound { id } => Some(format!(
                "No session with ID '{id}'. Use `mnemo recall --list` to see recent sessions."
            )),

            Self::Embedding(_) => Some(
                "Vector search is degraded; lexical recall still works. \
                 Check `embedding.provider` in config.json."
                    .to_string(),
            ),

            Self::Config(_) => Some(format!(
                "Check {} for syntax errors, or delete it to regenerate defaults.",
                config_file_hint().display()
            )),

            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, and exit code. Agents parse this
    /// instead of stderr text.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

fn config_file_hint() -> PathBuf {
    crate::config::memory_dir()
        .map(|d| d.join("config.json"))
        .unwrap_or_else(|| PathBuf::from("~/.mnemo/memory/config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_command_contract() {
        assert_eq!(Error::NotInitialized.exit_code(), 1);
        assert_eq!(Error::session_not_found("x").exit_code(), 2);
        assert_eq!(Error::InvalidArgument("bad".into()).exit_code(), 2);
        assert_eq!(Error::Storage(rusqlite::Error::InvalidQuery).exit_code(), 3);
        assert_eq!(Error::Embedding("no model".into()).exit_code(), 4);
    }

    #[test]
    fn structured_json_carries_code_and_hint() {
        let err = Error::NotInitialized;
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "NOT_INITIALIZED");
        assert_eq!(json["error"]["exit_code"], 1);
        assert!(json["error"]["hint"].as_str().unwrap().contains("mnemo init"));
    }

    #[test]
    fn not_found_hint_names_the_id() {
        let err = Error::session_not_found("abc123");
        assert!(err.hint().unwrap().contains("abc123"));
    }
}
