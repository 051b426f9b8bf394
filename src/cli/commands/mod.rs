//! Command implementations.

pub mod config;
pub mod import;
pub mod index;
pub mod init;
pub mod recall;
pub mod session;
pub mod status;

use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::service::MemoryService;
use std::path::PathBuf;

/// Open the service against an existing store.
///
/// Every command except `init` refuses to run before the store exists;
/// opening would otherwise silently create an empty database.
pub fn open_service(db: Option<&PathBuf>) -> Result<MemoryService> {
    let config = MemoryConfig::load();
    let db_path = config.resolve_db_path(db.map(PathBuf::as_path));
    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }
    let mut service = MemoryService::with_db_path(config, db_path);
    service.initialize()?;
    Ok(service)
}
