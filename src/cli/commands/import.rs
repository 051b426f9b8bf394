//! Import command: ingest legacy wire-format session logs.

use crate::config::sessions_dir;
use crate::error::{Error, Result};
use crate::import::SessionImporter;
use std::path::PathBuf;

/// Execute the import command.
///
/// # Errors
///
/// Returns `NotInitialized` before `init`; per-session failures end up in
/// the printed report instead.
pub fn execute(db: Option<&PathBuf>, dry_run: bool, json: bool) -> Result<()> {
    let service = super::open_service(db)?;
    let dir = sessions_dir()
        .ok_or_else(|| Error::Config("could not determine config root".to_string()))?;

    let mut importer = SessionImporter::new(&service);
    let stats = importer.import_all(&dir, dry_run)?;

    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        if dry_run {
            println!("(dry run: nothing was written)");
            println!();
        }
        println!("{}", stats.report());
    }
    Ok(())
}
