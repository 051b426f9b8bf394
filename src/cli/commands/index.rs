//! Index commands: force a single session or sweep the backlog.

use crate::error::{Error, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct IndexOutput {
    indexed: usize,
}

/// Index one session by id, or the current backlog when `id` is `None`.
///
/// # Errors
///
/// Returns `SessionNotFound` for an unknown id and storage errors from the
/// write-back.
pub fn execute(db: Option<&PathBuf>, id: Option<&str>, json: bool) -> Result<()> {
    let service = super::open_service(db)?;

    let indexed = match id {
        Some(session_id) => {
            if service.get_session(session_id)?.is_none() {
                return Err(Error::session_not_found(session_id));
            }
            usize::from(service.index_session(session_id, true)?)
        }
        None => service.batch_index(1000)?,
    };

    if json {
        println!("{}", serde_json::to_string(&IndexOutput { indexed })?);
    } else {
        match id {
            Some(session_id) => println!("Indexed session {session_id}"),
            None => println!("Indexed {indexed} session(s)"),
        }
    }
    Ok(())
}
