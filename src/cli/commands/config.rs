//! Config command: print the effective configuration and data paths.

use crate::config::{memory_dir, MemoryConfig, RecallSettings};
use crate::error::Result;

/// Execute the config command.
///
/// # Errors
///
/// Returns an error only if serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let config = MemoryConfig::load();

    if json {
        println!("{}", serde_json::to_string(&config)?);
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&config)?);
    if let Some(dir) = memory_dir() {
        println!();
        println!("Config file: {}", dir.join("config.json").display());
    }
    let settings = RecallSettings::load();
    println!("Recall mode: {:?} (enabled: {})", settings.mode, settings.enabled);
    Ok(())
}
