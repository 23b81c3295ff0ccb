// Schema validation for the input database.
//
// The whole run aborts if any required table or column is absent. This is
// checked up front with PRAGMA table_info, before a single row is read, so a
// malformed backup never produces a partial edge table.

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::debug;

use crate::error::PipelineError;

pub const MESSAGE_TABLE: &str = "message";
pub const MENTION_TABLE: &str = "mention";
pub const REACTION_TABLE: &str = "reaction";
pub const RECIPIENT_TABLE: &str = "recipient";
pub const REMAP_TABLE: &str = "remapped_recipients";

/// Tables the pipeline reads and the columns each must carry.
pub const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    (
        MESSAGE_TABLE,
        &[
            "_id",
            "date_sent",
            "date_received",
            "thread_id",
            "from_recipient_id",
            "to_recipient_id",
            "quote_id",
            "body",
        ],
    ),
    (
        MENTION_TABLE,
        &[
            "_id",
            "thread_id",
            "message_id",
            "recipient_id",
            "range_start",
            "range_length",
        ],
    ),
    (
        REACTION_TABLE,
        &["_id", "message_id", "author_id", "emoji", "date_sent"],
    ),
    (RECIPIENT_TABLE, &["_id", "uuid", "group_id"]),
    (REMAP_TABLE, &["_id", "old_id", "new_id"]),
];

/// List the columns of a table, or None if the table does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Option<Vec<String>>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info(\"{table}\")"))
        .with_context(|| format!("Failed to inspect table {table}"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    // PRAGMA table_info returns no rows for a table that doesn't exist
    if columns.is_empty() {
        Ok(None)
    } else {
        Ok(Some(columns))
    }
}

/// Check one table against its required column list.
pub fn check_table(conn: &Connection, table: &str, required: &[&str]) -> Result<()> {
    let columns = match table_columns(conn, table)? {
        Some(columns) => columns,
        None => {
            return Err(PipelineError::MissingTable {
                table: table.to_string(),
            }
            .into())
        }
    };

    let mut missing: Vec<String> = required
        .iter()
        .filter(|col| !columns.iter().any(|c| c == *col))
        .map(|col| col.to_string())
        .collect();

    if !missing.is_empty() {
        missing.sort();
        return Err(PipelineError::SchemaViolation {
            table: table.to_string(),
            missing,
        }
        .into());
    }

    debug!(table, columns = columns.len(), "Schema check passed");
    Ok(())
}

/// Validate every required table. Fails on the first table that doesn't conform.
pub fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required) in REQUIRED_COLUMNS {
        check_table(conn, table, required)?;
    }
    Ok(())
}

/// Whether an optional column is present on a table.
pub fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    Ok(table_columns(conn, table)?
        .map(|cols| cols.iter().any(|c| c == column))
        .unwrap_or(false))
}
