// Signal backup ingestion: the boundary between the chat database and the
// pipeline.
//
// We read a decrypted Signal backup (or the mocked equivalent) with rusqlite.
// The database is opened read-only; nothing in the pipeline ever writes to
// the input.

pub mod mock;
pub mod models;
pub mod queries;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Open an existing Signal database for reading.
pub fn open(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        anyhow::bail!("Database not found at {}", db_path.display());
    }

    Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))
}
