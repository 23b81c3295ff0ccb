// Row types for the Signal backup tables we read.
//
// These mirror the subset of columns the pipeline needs. Timestamps are
// epoch milliseconds, as Signal stores them.

use serde::{Deserialize, Serialize};

/// A recipient `_id`. After remap resolution this is the stable participant key.
pub type ParticipantId = i64;

/// A row of the `message` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub date_sent: i64,
    pub date_received: i64,
    pub thread_id: i64,
    pub from_recipient_id: ParticipantId,
    pub to_recipient_id: Option<ParticipantId>,
    /// `date_sent` of the quoted message, if this message quotes one.
    /// Signal writes 0 for "no quote"; that is normalised to None on load.
    pub quote_id: Option<i64>,
    pub body: Option<String>,
}

/// A row of the `mention` table (an @-mention inside a message body).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub id: i64,
    pub thread_id: i64,
    pub message_id: i64,
    pub recipient_id: ParticipantId,
    pub range_start: i64,
    pub range_length: i64,
}

/// A row of the `reaction` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: i64,
    pub message_id: i64,
    pub author_id: ParticipantId,
    pub emoji: String,
    pub date_sent: i64,
}

/// A row of the `recipient` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: ParticipantId,
    pub uuid: Option<String>,
    pub group_id: Option<String>,
    pub profile_joined_name: Option<String>,
    pub system_joined_name: Option<String>,
}

/// A row of `remapped_recipients`: every reference to `old_id` means `new_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRemap {
    pub old_id: ParticipantId,
    pub new_id: ParticipantId,
}

/// Everything the pipeline consumes from one database, in `_id` order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalTables {
    pub messages: Vec<Message>,
    pub mentions: Vec<Mention>,
    pub reactions: Vec<Reaction>,
    pub recipients: Vec<Recipient>,
    pub remaps: Vec<RecipientRemap>,
}
