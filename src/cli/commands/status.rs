//! Status command: store totals and capability flags.

use crate::error::Result;
use crate::storage::StoreStats;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct StatusOutput {
    stats: StoreStats,
    embedding_provider: String,
    embedding_model: String,
    embedding_dimensions: usize,
    semantic: bool,
}

/// Execute the status command.
///
/// # Errors
///
/// Returns `NotInitialized` when the store does not exist yet.
pub fn execute(db: Option<&PathBuf>, json: bool) -> Result<()> {
    let service = super::open_service(db)?;
    let stats = service.get_stats()?;
    let embedding = service.embedding_info()?;

    if json {
        let output = StatusOutput {
            stats,
            embedding_provider: embedding.name,
            embedding_model: embedding.model,
            embedding_dimensions: embedding.dimensions,
            semantic: embedding.semantic,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "Memory Store Status".bold());
    println!("===================");
    println!();
    println!("Sessions:  {} ({} archived)", stats.total_sessions, stats.archived_sessions);
    println!("Messages:  {}", stats.total_messages);
    println!("Tokens:    {}", stats.total_tokens);
    match stats.indexed_vectors {
        Some(count) => println!("Vectors:   {count} indexed"),
        None => println!("Vectors:   unavailable"),
    }
    println!();
    println!(
        "Embedding: {} ({}, {}d{})",
        embedding.name,
        embedding.model,
        embedding.dimensions,
        if embedding.semantic { "" } else { ", no semantic signal" }
    );
    println!(
        "Vector search: {}",
        if stats.vec_available { "available" } else { "unavailable" }
    );

    Ok(())
}
