//! Initialize the memory store.
//!
//! Creates `<config_root>/memory/` with a `config.json` (defaults unless one
//! already exists), then opens the store so the schema is applied.

use crate::config::{memory_dir, MemoryConfig};
use crate::error::{Error, Result};
use crate::service::MemoryService;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    config: PathBuf,
    database: PathBuf,
    embedding_provider: String,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if directories cannot be created or the store fails
/// to open.
pub fn execute(db: Option<&PathBuf>, force: bool, json: bool) -> Result<()> {
    let dir = memory_dir()
        .ok_or_else(|| Error::Config("could not determine config root".to_string()))?;
    std::fs::create_dir_all(&dir)?;

    let config_path = dir.join("config.json");
    let config = if config_path.exists() && !force {
        MemoryConfig::load_from(&config_path)
    } else {
        let config = MemoryConfig::default();
        config.save()?;
        config
    };

    let db_path = config.resolve_db_path(db.map(PathBuf::as_path));
    let mut service = MemoryService::with_db_path(config, db_path.clone());
    service.initialize()?;
    let provider = service.embedding_info()?.name;
    service.close();

    if json {
        let output = InitOutput {
            config: config_path,
            database: db_path,
            embedding_provider: provider,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized memory store");
        println!("  Config:    {}", config_path.display());
        println!("  Database:  {}", db_path.display());
        println!("  Embedding: {provider}");
    }

    Ok(())
}
