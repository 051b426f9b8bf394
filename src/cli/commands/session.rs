//! Session command: fetch and render one session with its messages.

use crate::error::{Error, Result};
use crate::model::Message;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct SessionOutput {
    session: crate::model::Session,
    messages: Vec<Message>,
}

/// Execute the session command.
///
/// # Errors
///
/// Returns `SessionNotFound` for an unknown id.
pub fn execute(db: Option<&PathBuf>, id: &str, json: bool) -> Result<()> {
    let service = super::open_service(db)?;
    let session = service
        .get_session(id)?
        .ok_or_else(|| Error::session_not_found(id))?;
    let messages = service.get_messages(id, 1000, 0)?;

    if json {
        println!("{}", serde_json::to_string(&SessionOutput { session, messages })?);
        return Ok(());
    }

    let created = chrono::DateTime::from_timestamp(session.created_at, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let updated = chrono::DateTime::from_timestamp(session.updated_at, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("{}", session.title.bold());
    println!("  id:       {}", session.id);
    println!("  created:  {created}");
    println!("  updated:  {updated}");
    println!("  tokens:   {}", session.token_count);
    if session.is_archived {
        println!("  archived: yes");
    }
    if let Some(work_dir) = &session.work_dir {
        println!("  dir:      {work_dir}");
    }
    if !session.keywords.is_empty() {
        println!("  keywords: {}", session.keywords.join(", "));
    }
    if let Some(summary) = &session.summary {
        println!("  summary:  {summary}");
    }
    println!();

    for message in &messages {
        let stamp = chrono::DateTime::from_timestamp(message.timestamp, 0)
            .map(|dt| dt.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        println!("[{stamp}] {}:", message.role);
        for line in message.content.lines() {
            println!("  {line}");
        }
        println!();
    }

    if messages.is_empty() {
        println!("(no messages)");
    }

    Ok(())
}
