// Mocked dataset: a synthetic Signal-shaped database for demos and tests.
//
// The generator is seeded, so the same seed always writes the same rows.
// Besides ordinary traffic it plants the awkward cases the pipeline has to
// survive: a quote of a message that doesn't exist, a reaction to a message
// that doesn't exist, a self-reaction, a reaction sent before its message
// (clock skew), and a participant whose old recipient id has been remapped.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

/// Thread id of the mocked group conversation.
pub const MOCK_GROUP_THREAD: i64 = 2;
/// A one-to-one side conversation, excluded when analysing the group.
pub const MOCK_SIDE_THREAD: i64 = 3;
/// Recipient id of the group itself (messages are addressed to it).
pub const MOCK_GROUP_RECIPIENT: i64 = 10;
/// Stale recipient id that `remapped_recipients` points at participant 4.
pub const MOCK_REMAPPED_OLD_ID: i64 = 9;

/// First message timestamp: 2023-11-14T22:13:20Z in epoch milliseconds.
const BASE_TS: i64 = 1_700_000_000_000;

const PARTICIPANTS: &[(i64, &str)] = &[
    (1, "Alex"),
    (2, "Blair"),
    (3, "Casey"),
    (4, "Devon"),
    (5, "Emery"),
];

/// Senders as they appear in raw rows. Devon shows up under both ids.
const RAW_SENDERS: &[i64] = &[1, 2, 3, 4, MOCK_REMAPPED_OLD_ID, 5];

const EMOJI: &[&str] = &["👍", "❤️", "😂", "😮", "🙌", "🔥"];

const BODIES: &[&str] = &[
    "anyone around tonight?",
    "ha, that's exactly what I said",
    "I can bring snacks",
    "did you see the match?",
    "not sure I agree with that",
    "running late, sorry",
    "same here",
    "who's hosting next week?",
    "that photo is amazing",
    "let's do Saturday instead",
];

/// Counts of what `seed_tables` wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSummary {
    pub messages: usize,
    pub reactions: usize,
    pub mentions: usize,
}

/// Create the Signal tables if they don't exist yet. Idempotent.
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS recipient (
            _id INTEGER PRIMARY KEY,
            uuid TEXT,
            group_id TEXT,
            profile_joined_name TEXT,
            system_joined_name TEXT
        );

        CREATE TABLE IF NOT EXISTS remapped_recipients (
            _id INTEGER PRIMARY KEY AUTOINCREMENT,
            old_id INTEGER NOT NULL,
            new_id INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS message (
            _id INTEGER PRIMARY KEY,
            date_sent INTEGER NOT NULL,
            date_received INTEGER,
            thread_id INTEGER NOT NULL,
            from_recipient_id INTEGER NOT NULL,
            to_recipient_id INTEGER,
            quote_id INTEGER DEFAULT 0,
            body TEXT
        );

        CREATE TABLE IF NOT EXISTS mention (
            _id INTEGER PRIMARY KEY,
            thread_id INTEGER NOT NULL,
            message_id INTEGER NOT NULL,
            recipient_id INTEGER NOT NULL,
            range_start INTEGER NOT NULL,
            range_length INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reaction (
            _id INTEGER PRIMARY KEY,
            message_id INTEGER NOT NULL,
            author_id INTEGER NOT NULL,
            emoji TEXT NOT NULL,
            date_sent INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_message_thread_date
            ON message(thread_id, date_sent);

        CREATE INDEX IF NOT EXISTS idx_reaction_message
            ON reaction(message_id);
        ",
    )
    .context("Failed to create mock Signal tables")?;
    Ok(())
}

/// Write a mock database file at `path`, replacing any previous one.
pub fn write_database(path: &Path, seed: u64, message_count: usize) -> Result<MockSummary> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create directory for mock database: {}", path.display())
            })?;
        }
    }
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to replace mock database at {}", path.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to create mock database at {}", path.display()))?;
    create_schema(&conn)?;
    seed_tables(&conn, seed, message_count)
}

/// Fill an (empty) schema with a deterministic synthetic conversation.
pub fn seed_tables(conn: &Connection, seed: u64, message_count: usize) -> Result<MockSummary> {
    let mut rng = StdRng::seed_from_u64(seed);
    let tx = conn.unchecked_transaction()?;

    for (id, name) in PARTICIPANTS {
        tx.execute(
            "INSERT INTO recipient (_id, uuid, group_id, profile_joined_name)
             VALUES (?1, ?2, NULL, ?3)",
            params![id, format!("00000000-0000-4000-8000-{id:012}"), name],
        )?;
    }
    // Devon's stale recipient row, left behind by a number change
    tx.execute(
        "INSERT INTO recipient (_id, uuid, group_id, profile_joined_name)
         VALUES (?1, NULL, NULL, NULL)",
        params![MOCK_REMAPPED_OLD_ID],
    )?;
    tx.execute(
        "INSERT INTO recipient (_id, uuid, group_id, profile_joined_name)
         VALUES (?1, NULL, ?2, NULL)",
        params![MOCK_GROUP_RECIPIENT, "__signal_group__mock_friends"],
    )?;
    tx.execute(
        "INSERT INTO remapped_recipients (old_id, new_id) VALUES (?1, ?2)",
        params![MOCK_REMAPPED_OLD_ID, 4],
    )?;

    // (id, date_sent, sender) for every group message written so far
    let mut written: Vec<(i64, i64, i64)> = Vec::with_capacity(message_count);
    let mut next_message_id = 1_i64;
    let mut next_reaction_id = 1_i64;
    let mut next_mention_id = 1_i64;
    let mut ts = BASE_TS;

    for _ in 0..message_count {
        // 10 seconds to 30 minutes between messages
        ts += rng.random_range(10_000..1_800_000);
        let sender = RAW_SENDERS[rng.random_range(0..RAW_SENDERS.len())];
        let body = BODIES[rng.random_range(0..BODIES.len())];

        let quote_ts = if !written.is_empty() && rng.random_bool(0.15) {
            let (_, quoted_ts, _) = written[rng.random_range(0..written.len())];
            quoted_ts
        } else {
            0
        };

        let id = next_message_id;
        next_message_id += 1;
        tx.execute(
            "INSERT INTO message (_id, date_sent, date_received, thread_id,
                                  from_recipient_id, to_recipient_id, quote_id, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                ts,
                ts + rng.random_range(100..5_000),
                MOCK_GROUP_THREAD,
                sender,
                MOCK_GROUP_RECIPIENT,
                quote_ts,
                body
            ],
        )?;
        written.push((id, ts, sender));

        if rng.random_bool(0.3) {
            let author = loop {
                let candidate = PARTICIPANTS[rng.random_range(0..PARTICIPANTS.len())].0;
                if candidate != sender {
                    break candidate;
                }
            };
            tx.execute(
                "INSERT INTO reaction (_id, message_id, author_id, emoji, date_sent)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    next_reaction_id,
                    id,
                    author,
                    EMOJI[rng.random_range(0..EMOJI.len())],
                    ts + rng.random_range(5_000..7_200_000)
                ],
            )?;
            next_reaction_id += 1;
        }

        if rng.random_bool(0.1) {
            let mentioned = PARTICIPANTS[rng.random_range(0..PARTICIPANTS.len())].0;
            tx.execute(
                "INSERT INTO mention (_id, thread_id, message_id, recipient_id, range_start, range_length)
                 VALUES (?1, ?2, ?3, ?4, 0, 1)",
                params![next_mention_id, MOCK_GROUP_THREAD, id, mentioned],
            )?;
            next_mention_id += 1;
        }
    }

    // Planted edge cases
    ts += 60_000;
    let dangling_quote_id = next_message_id;
    next_message_id += 1;
    tx.execute(
        "INSERT INTO message (_id, date_sent, date_received, thread_id,
                              from_recipient_id, to_recipient_id, quote_id, body)
         VALUES (?1, ?2, ?3, ?4, 2, ?5, ?6, 'replying to a deleted message')",
        params![
            dangling_quote_id,
            ts,
            ts + 500,
            MOCK_GROUP_THREAD,
            MOCK_GROUP_RECIPIENT,
            BASE_TS - 1
        ],
    )?;

    tx.execute(
        "INSERT INTO reaction (_id, message_id, author_id, emoji, date_sent)
         VALUES (?1, 999999, 3, '👍', ?2)",
        params![next_reaction_id, ts],
    )?;
    next_reaction_id += 1;

    // Blair reacting to their own message
    tx.execute(
        "INSERT INTO reaction (_id, message_id, author_id, emoji, date_sent)
         VALUES (?1, ?2, 2, '😂', ?3)",
        params![next_reaction_id, dangling_quote_id, ts + 1_000],
    )?;
    next_reaction_id += 1;

    // Emery's phone clock runs two seconds behind
    tx.execute(
        "INSERT INTO reaction (_id, message_id, author_id, emoji, date_sent)
         VALUES (?1, ?2, 5, '🔥', ?3)",
        params![next_reaction_id, dangling_quote_id, ts - 2_000],
    )?;
    next_reaction_id += 1;

    // A short side conversation in another thread
    for (offset, sender, to) in [(0_i64, 1_i64, 2_i64), (45_000, 2, 1), (90_000, 1, 2)] {
        tx.execute(
            "INSERT INTO message (_id, date_sent, date_received, thread_id,
                                  from_recipient_id, to_recipient_id, quote_id, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'side chat')",
            params![
                next_message_id,
                BASE_TS + offset,
                BASE_TS + offset + 300,
                MOCK_SIDE_THREAD,
                sender,
                to
            ],
        )?;
        next_message_id += 1;
    }

    tx.commit()?;

    let summary = MockSummary {
        messages: (next_message_id - 1) as usize,
        reactions: (next_reaction_id - 1) as usize,
        mentions: (next_mention_id - 1) as usize,
    };
    info!(
        seed,
        messages = summary.messages,
        reactions = summary.reactions,
        mentions = summary.mentions,
        "Seeded mock Signal database"
    );
    Ok(summary)
}
