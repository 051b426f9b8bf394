//! Recall commands: search past sessions, render results, and re-emit
//! selected results for prompt injection.
//!
//! Without a query the command reads conversational context from stdin
//! (the host shell pipes the recent turns in); that text drives both
//! search legs and doubles as the live context for deduplication.

use crate::config::{load_last_recall, save_last_recall, RecallMode, RecallSettings};
use crate::error::{Error, Result};
use crate::model::{RecallResult, Role};
use crate::recall::{analyzer, build_prompt_context};
use crate::service::MemoryService;
use colored::Colorize;
use std::io::Read;
use std::path::PathBuf;

/// Token budget for the emitted context block.
const CONTEXT_BUDGET_TOKENS: usize = 2000;

/// Execute the recall command.
///
/// # Errors
///
/// Returns `NotInitialized` before `init` and `InvalidArgument` when no
/// query is given and stdin carries no context.
#[allow(clippy::fn_params_excessive_bools)]
pub fn execute(
    db: Option<&PathBuf>,
    query: Option<&str>,
    verbose: bool,
    list: bool,
    stats: bool,
    mode: Option<RecallMode>,
    json: bool,
) -> Result<()> {
    let service = super::open_service(db)?;

    if stats {
        return show_stats(&service, json);
    }
    if list {
        return list_sessions(&service, json);
    }

    let mut settings = RecallSettings::load();
    if let Some(mode) = mode {
        settings.mode = mode;
        settings.save()?;
    }

    let context_text = resolve_context(query)?;
    let query_class = analyzer::classify(&context_text);
    let (vector_weight, keyword_weight) = query_class.weights();

    // Piped context is by definition already visible to the caller.
    let active_context: Vec<String> = if query.is_none() {
        vec![context_text.clone()]
    } else {
        Vec::new()
    };

    let results = service.recall(&context_text, None, None, &active_context)?;
    save_last_recall(&results)?;

    if json {
        println!("{}", serde_json::to_string(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No related conversations found");
        return Ok(());
    }

    if settings.mode != RecallMode::Inject {
        println!(
            "Found {} related conversation(s)  [{} search: vector {:.0}% + keyword {:.0}%]",
            results.len(),
            query_class.label(),
            vector_weight * 100.0,
            keyword_weight * 100.0
        );
        println!();
        for (i, result) in results.iter().enumerate() {
            print_result(i + 1, result, verbose);
        }
        println!("Apply results with: mnemo recall-apply <N|all>");
    }

    if settings.mode != RecallMode::Manual {
        if settings.mode == RecallMode::Auto {
            println!();
        }
        print!("{}", build_prompt_context(&results, CONTEXT_BUDGET_TOKENS));
    }

    Ok(())
}

/// Execute the recall-apply command: re-emit the context block for a
/// selection of the last recall's results.
///
/// # Errors
///
/// Returns `InvalidArgument` for a malformed selection or when no recall
/// has been run yet.
pub fn execute_apply(selection: &str, json: bool) -> Result<()> {
    let results = load_last_recall()?;
    let indices = parse_selection(selection, results.len())?;
    let selected: Vec<RecallResult> = indices.into_iter().map(|i| results[i].clone()).collect();

    if json {
        println!("{}", serde_json::to_string(&selected)?);
    } else {
        print!("{}", build_prompt_context(&selected, CONTEXT_BUDGET_TOKENS));
    }
    Ok(())
}

/// Use the query if given, otherwise read piped context from stdin.
fn resolve_context(query: Option<&str>) -> Result<String> {
    if let Some(q) = query {
        let trimmed = q.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        let mut piped = String::new();
        std::io::stdin().read_to_string(&mut piped)?;
        let trimmed = piped.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    Err(Error::InvalidArgument(
        "no query given and no context on stdin; try `mnemo recall \"your question\"`".to_string(),
    ))
}

fn print_result(rank: usize, result: &RecallResult, verbose: bool) {
    let date = chrono::DateTime::from_timestamp(result.session.updated_at, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("[{rank}] {}", result.session.title.bold());
    let mut meta = format!(
        "    date: {date} | relevance: {:.1}%",
        result.combined_score * 100.0
    );
    if verbose {
        let short_id: String = result.session.id.chars().take(8).collect();
        meta.push_str(&format!(" | id: {short_id}"));
    }
    println!("{meta}");

    if !result.session.keywords.is_empty() {
        println!(
            "    keywords: {}",
            result.session.keywords.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
        );
    }
    if let Some(work_dir) = &result.session.work_dir {
        println!("    dir: {work_dir}");
    }

    let preview_len = if verbose { 200 } else { 80 };
    if let Some(user_msg) = result.context_messages.iter().find(|m| m.role == Role::User) {
        println!("    you: {}", preview(&user_msg.content, preview_len));
    }
    if verbose {
        if let Some(ai_msg) = result
            .context_messages
            .iter()
            .find(|m| m.role == Role::Assistant)
        {
            println!("    ai:  {}", preview(&ai_msg.content, 150));
        }
    }
    println!("    view: mnemo session {}", result.session.id);
    println!();
}

fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let kept: String = flat.chars().take(max).collect();
        format!("{kept}...")
    }
}

/// Parse `N`, `N,M`, `N-M` combinations, or `all` into zero-based indices.
fn parse_selection(selection: &str, len: usize) -> Result<Vec<usize>> {
    let bad = |input: &str| {
        Error::InvalidArgument(format!(
            "invalid selection '{input}'; expected e.g. `2`, `1,3-5`, or `all`"
        ))
    };

    if len == 0 {
        return Err(Error::InvalidArgument(
            "the last recall returned no results".to_string(),
        ));
    }
    if selection.trim().eq_ignore_ascii_case("all") {
        return Ok((0..len).collect());
    }

    let mut indices: Vec<usize> = Vec::new();
    for part in selection.split(',') {
        let part = part.trim();
        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start.trim().parse().map_err(|_| bad(selection))?;
            let end: usize = end.trim().parse().map_err(|_| bad(selection))?;
            if start == 0 || end < start || end > len {
                return Err(bad(selection));
            }
            indices.extend((start - 1)..end);
        } else {
            let n: usize = part.parse().map_err(|_| bad(selection))?;
            if n == 0 || n > len {
                return Err(bad(selection));
            }
            indices.push(n - 1);
        }
    }

    indices.dedup();
    Ok(indices)
}

fn show_stats(service: &MemoryService, json: bool) -> Result<()> {
    let stats = service.get_stats()?;
    if json {
        println!("{}", serde_json::to_string(&stats)?);
        return Ok(());
    }

    println!("{}", "Memory statistics".bold());
    println!();
    println!("Total sessions: {}", stats.total_sessions);
    println!("Total messages: {}", stats.total_messages);
    println!("Total tokens:   {}", stats.total_tokens);
    println!("Archived:       {}", stats.archived_sessions);
    if let Some(vectors) = stats.indexed_vectors {
        println!("Indexed vectors: {vectors}");
    }
    println!(
        "Vector search:  {}",
        if stats.vec_available { "yes" } else { "no" }
    );
    println!();
    println!("Search strategies:");
    println!("  * file lookup     - file names and paths, keyword-heavy");
    println!("  * vague recall    - \"that thing\", \"last time\", vector-heavy");
    println!("  * error debugging - error vocabulary and status codes, balanced");
    println!("  * technical       - default hybrid weighting");
    Ok(())
}

fn list_sessions(service: &MemoryService, json: bool) -> Result<()> {
    let sessions = service.list_sessions(20, 0, None)?;
    if json {
        println!("{}", serde_json::to_string(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions recorded yet");
        return Ok(());
    }

    println!("{}", "Recent sessions".bold());
    println!();
    for session in sessions {
        let date = chrono::DateTime::from_timestamp(session.updated_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let status = if session.is_archived { "archived" } else { "active" };
        println!("[{status}] [{date}] {}", session.title);
        if !session.keywords.is_empty() {
            println!(
                "    keywords: {}",
                session.keywords.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
            );
        }
        println!("    view: mnemo session {}", session.id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_single_and_ranges() {
        assert_eq!(parse_selection("2", 5).unwrap(), vec![1]);
        assert_eq!(parse_selection("1,3-5", 5).unwrap(), vec![0, 2, 3, 4]);
        assert_eq!(parse_selection("all", 3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn selection_rejects_out_of_range() {
        assert!(parse_selection("0", 3).is_err());
        assert!(parse_selection("4", 3).is_err());
        assert!(parse_selection("3-1", 3).is_err());
        assert!(parse_selection("x", 3).is_err());
        assert!(parse_selection("1", 0).is_err());
    }

    #[test]
    fn preview_flattens_newlines() {
        assert_eq!(preview("a\nb", 10), "a b");
        assert_eq!(preview(&"z".repeat(20), 5), "zzzzz...");
    }
}
