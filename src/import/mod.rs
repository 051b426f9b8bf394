//! Legacy session importer.
//!
//! Ingests the host app's on-disk logs from
//! `<config_root>/sessions/<work_hash>/<session_id>/*.wire` — line-delimited
//! JSON with records typed `metadata` (skipped), `turn_begin` (user input,
//! either a string or a list of typed parts), `text` (assistant reply), and
//! `tool_result` (serialized and truncated). Each session directory becomes
//! one stored session; existing ids are skipped and every imported session
//! is indexed on the spot.

use crate::error::Result;
use crate::model::{now_ts, Message, Role, Session};
use crate::service::MemoryService;
use crate::storage::StorageBackend;
use serde::Serialize;
use std::path::Path;

/// Title length derived from the first user message.
const TITLE_CHARS: usize = 50;

/// Tool results are stored as previews, not full payloads.
const TOOL_RESULT_CHARS: usize = 200;

/// Import statistics and per-session failures.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    pub total_sessions: usize,
    pub imported_sessions: usize,
    pub skipped_sessions: usize,
    pub total_messages: usize,
    pub imported_messages: usize,
    pub errors: Vec<String>,
}

impl ImportStats {
    /// Human-readable import report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = vec![
            "Session Import Report".to_string(),
            String::new(),
            format!("Total sessions found: {}", self.total_sessions),
            format!("Imported: {}", self.imported_sessions),
            format!("Skipped (existing): {}", self.skipped_sessions),
            format!("Total messages: {}", self.total_messages),
            format!("Imported messages: {}", self.imported_messages),
        ];
        if !self.errors.is_empty() {
            lines.push(String::new());
            lines.push("Errors:".to_string());
            for error in self.errors.iter().take(10) {
                lines.push(format!("  - {error}"));
            }
            if self.errors.len() > 10 {
                lines.push(format!("  ... and {} more", self.errors.len() - 10));
            }
        }
        lines.join("\n")
    }
}

/// One parsed wire message before persistence.
struct ParsedMessage {
    role: Role,
    content: String,
    timestamp: i64,
}

struct ParsedSession {
    session_id: String,
    title: String,
    messages: Vec<ParsedMessage>,
    created_at: i64,
    updated_at: i64,
}

/// Imports legacy wire logs into the memory store.
pub struct SessionImporter<'a> {
    service: &'a MemoryService,
    stats: ImportStats,
}

impl<'a> SessionImporter<'a> {
    #[must_use]
    pub fn new(service: &'a MemoryService) -> Self {
        Self {
            service,
            stats: ImportStats::default(),
        }
    }

    /// Walk the sessions directory and import everything found.
    ///
    /// With `dry_run` nothing is written; the stats show what would happen.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` when the service is not ready. Per-session
    /// failures are collected in the stats, not raised.
    pub fn import_all(&mut self, sessions_dir: &Path, dry_run: bool) -> Result<ImportStats> {
        // Fail early if the service cannot be used at all.
        self.service.storage()?;

        if !sessions_dir.exists() {
            self.stats
                .errors
                .push(format!("sessions directory not found: {}", sessions_dir.display()));
            return Ok(self.stats.clone());
        }

        for work_dir in read_dirs(sessions_dir) {
            for session_dir in read_dirs(&work_dir) {
                self.stats.total_sessions += 1;
                let session_id = session_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                match self.import_one(&session_dir, &session_id, &work_dir, dry_run) {
                    Ok(Outcome::Imported(messages)) => {
                        self.stats.imported_sessions += 1;
                        self.stats.imported_messages += messages;
                    }
                    Ok(Outcome::Skipped) => self.stats.skipped_sessions += 1,
                    Ok(Outcome::Empty) => {}
                    Err(e) => self
                        .stats
                        .errors
                        .push(format!("failed to import {session_id}: {e}")),
                }
            }
        }

        Ok(self.stats.clone())
    }

    fn import_one(
        &mut self,
        session_dir: &Path,
        session_id: &str,
        work_dir: &Path,
        dry_run: bool,
    ) -> Result<Outcome> {
        if self.service.get_session(session_id)?.is_some() {
            return Ok(Outcome::Skipped);
        }

        let Some(parsed) = parse_session_dir(session_dir, session_id)? else {
            return Ok(Outcome::Empty);
        };
        self.stats.total_messages += parsed.messages.len();

        if dry_run {
            return Ok(Outcome::Imported(parsed.messages.len()));
        }

        let storage = self.service.storage()?;
        let mut session = Session::new(&parsed.session_id, &parsed.title, None);
        session.work_dir = Some(work_dir.to_string_lossy().into_owned());
        session.created_at = parsed.created_at;
        session.updated_at = parsed.updated_at;
        storage.create_session(&session)?;

        let mut total_tokens = 0;
        let count = parsed.messages.len();
        for parsed_msg in parsed.messages {
            let token_count = parsed_msg.content.chars().count() as i64 / 4;
            let mut message = Message::with_timestamp(
                session_id,
                parsed_msg.role,
                parsed_msg.content,
                token_count,
                parsed_msg.timestamp,
            );
            storage.add_message(&mut message)?;
            total_tokens += token_count;
        }

        session.token_count = total_tokens;
        storage.update_session(&mut session)?;

        if let Err(e) = self.service.index_session(session_id, true) {
            tracing::warn!("indexing imported session {session_id} failed: {e}");
        }

        Ok(Outcome::Imported(count))
    }
}

enum Outcome {
    Imported(usize),
    Skipped,
    Empty,
}

fn read_dirs(path: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(path)
        .map(|entries| {
            entries
                .filter_map(std::result::Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default()
}

/// Parse the first `.wire` file in a session directory.
fn parse_session_dir(session_dir: &Path, session_id: &str) -> Result<Option<ParsedSession>> {
    let Some(wire_file) = std::fs::read_dir(session_dir)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .find(|p| p.extension().is_some_and(|ext| ext == "wire"))
    else {
        return Ok(None);
    };

    let raw = std::fs::read_to_string(&wire_file)?;
    let mut messages: Vec<ParsedMessage> = Vec::new();
    let mut title: Option<String> = None;
    let mut first_user_ts: Option<i64> = None;
    let mut last_user_ts: Option<i64> = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(record) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        if record.get("type").and_then(|t| t.as_str()) == Some("metadata") {
            continue;
        }

        let Some(message) = parse_wire_record(&record) else {
            continue;
        };

        if message.role == Role::User {
            if first_user_ts.is_none() {
                first_user_ts = Some(message.timestamp);
            }
            last_user_ts = Some(message.timestamp);
            if title.is_none() && !message.content.is_empty() {
                title = Some(truncate_title(&message.content));
            }
        }
        messages.push(message);
    }

    if messages.is_empty() {
        return Ok(None);
    }

    let short_id: String = session_id.chars().take(8).collect();
    Ok(Some(ParsedSession {
        session_id: session_id.to_string(),
        title: title.unwrap_or_else(|| format!("Imported ({short_id})")),
        messages,
        created_at: first_user_ts.unwrap_or_else(now_ts),
        updated_at: last_user_ts.unwrap_or_else(now_ts),
    }))
}

/// Map one wire record to a message; unknown types yield `None`.
fn parse_wire_record(record: &serde_json::Value) -> Option<ParsedMessage> {
    let timestamp = record.get("timestamp").and_then(serde_json::Value::as_i64).unwrap_or(0);
    let envelope = record.get("message")?;

    match envelope.get("type").and_then(|t| t.as_str())? {
        "turn_begin" => {
            let content = extract_user_input(envelope.get("user_input")?);
            Some(ParsedMessage {
                role: Role::User,
                content,
                timestamp,
            })
        }
        "text" => Some(ParsedMessage {
            role: Role::Assistant,
            content: envelope
                .get("text")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string(),
            timestamp,
        }),
        "tool_result" => {
            let payload = envelope
                .get("result")
                .map(std::string::ToString::to_string)
                .unwrap_or_default();
            let preview: String = payload.chars().take(TOOL_RESULT_CHARS).collect();
            Some(ParsedMessage {
                role: Role::Assistant,
                content: format!("[Tool Result] {preview}"),
                timestamp,
            })
        }
        _ => None,
    }
}

/// User input is either a plain string or a list of typed parts.
fn extract_user_input(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part.get("type").and_then(|t| t.as_str()) {
                Some("text") => part.get("text").and_then(|t| t.as_str()).map(str::to_string),
                Some("image_url") => Some("[Image]".to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

fn truncate_title(content: &str) -> String {
    if content.chars().count() <= TITLE_CHARS {
        content.to_string()
    } else {
        let kept: String = content.chars().take(TITLE_CHARS).collect();
        format!("{kept}...")
    }
}
