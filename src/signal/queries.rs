// Row loaders for the Signal tables.
//
// Every read of the input database goes through this module. Callers get
// plain Rust structs and never touch SQL.

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use super::models::{Mention, Message, Reaction, Recipient, RecipientRemap, SignalTables};
use super::schema::{self, RECIPIENT_TABLE, REQUIRED_COLUMNS};

/// Validate the schema, then load every table the pipeline needs.
pub fn load_tables(conn: &Connection) -> Result<SignalTables> {
    schema::validate_schema(conn)?;

    let tables = SignalTables {
        messages: load_messages(conn)?,
        mentions: load_mentions(conn)?,
        reactions: load_reactions(conn)?,
        recipients: load_recipients(conn)?,
        remaps: load_remaps(conn)?,
    };

    info!(
        messages = tables.messages.len(),
        mentions = tables.mentions.len(),
        reactions = tables.reactions.len(),
        recipients = tables.recipients.len(),
        remaps = tables.remaps.len(),
        "Loaded Signal tables"
    );

    Ok(tables)
}

pub fn load_messages(conn: &Connection) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT _id, date_sent, date_received, thread_id, from_recipient_id,
                to_recipient_id, quote_id, body
         FROM message
         ORDER BY _id",
    )?;

    let rows = stmt
        .query_map([], |row| {
            let quote_id: Option<i64> = row.get(6)?;
            Ok(Message {
                id: row.get(0)?,
                date_sent: row.get(1)?,
                date_received: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
                thread_id: row.get(3)?,
                from_recipient_id: row.get(4)?,
                to_recipient_id: row.get(5)?,
                // Signal writes 0 when there is no quote
                quote_id: quote_id.filter(|&ts| ts != 0),
                body: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read message table")?;

    Ok(rows)
}

pub fn load_mentions(conn: &Connection) -> Result<Vec<Mention>> {
    let mut stmt = conn.prepare(
        "SELECT _id, thread_id, message_id, recipient_id, range_start, range_length
         FROM mention
         ORDER BY _id",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(Mention {
                id: row.get(0)?,
                thread_id: row.get(1)?,
                message_id: row.get(2)?,
                recipient_id: row.get(3)?,
                range_start: row.get(4)?,
                range_length: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read mention table")?;

    Ok(rows)
}

pub fn load_reactions(conn: &Connection) -> Result<Vec<Reaction>> {
    let mut stmt = conn.prepare(
        "SELECT _id, message_id, author_id, emoji, date_sent
         FROM reaction
         ORDER BY _id",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(Reaction {
                id: row.get(0)?,
                message_id: row.get(1)?,
                author_id: row.get(2)?,
                emoji: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                date_sent: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read reaction table")?;

    Ok(rows)
}

/// Load recipients. The display-name columns are optional: older backups
/// and the minimal schema don't carry them, so NULL is selected in their place.
pub fn load_recipients(conn: &Connection) -> Result<Vec<Recipient>> {
    let profile = optional_column(conn, "profile_joined_name")?;
    let system = optional_column(conn, "system_joined_name")?;

    let mut stmt = conn.prepare(&format!(
        "SELECT _id, uuid, group_id, {profile}, {system}
         FROM recipient
         ORDER BY _id"
    ))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(Recipient {
                id: row.get(0)?,
                uuid: row.get(1)?,
                group_id: row.get(2)?,
                profile_joined_name: row.get(3)?,
                system_joined_name: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read recipient table")?;

    Ok(rows)
}

pub fn load_remaps(conn: &Connection) -> Result<Vec<RecipientRemap>> {
    let mut stmt = conn.prepare(
        "SELECT old_id, new_id
         FROM remapped_recipients
         ORDER BY _id",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(RecipientRemap {
                old_id: row.get(0)?,
                new_id: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read remapped_recipients table")?;

    Ok(rows)
}

/// Row counts for every required table that exists. Used by `status`.
pub fn table_counts(conn: &Connection) -> Result<Vec<(&'static str, Option<i64>)>> {
    let mut counts = Vec::with_capacity(REQUIRED_COLUMNS.len());
    for (table, _) in REQUIRED_COLUMNS {
        let count = if schema::table_columns(conn, table)?.is_some() {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
                    row.get(0)
                })?;
            Some(n)
        } else {
            None
        };
        counts.push((*table, count));
    }
    Ok(counts)
}

fn optional_column(conn: &Connection, column: &str) -> Result<String> {
    if schema::has_column(conn, RECIPIENT_TABLE, column)? {
        Ok(column.to_string())
    } else {
        Ok("NULL".to_string())
    }
}
