// Interaction extraction: turns raw messages and reactions into
// (responder → stimulus author) observations.
//
// Three kinds of interaction are recognised:
// - TextResponse: a message answers the most recent message from someone else
// - QuoteResponse: a message explicitly quotes an earlier one
// - EmojiReaction: a participant reacts to a message
//
// Rows that can't be resolved (quotes of missing messages, reactions to
// missing messages) are dropped and counted in Diagnostics. They never abort
// the run.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::signal::models::{Message, ParticipantId, Reaction, SignalTables};

/// The three interaction categories, each with a fixed base weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    TextResponse,
    QuoteResponse,
    EmojiReaction,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 3] = [
        InteractionKind::TextResponse,
        InteractionKind::QuoteResponse,
        InteractionKind::EmojiReaction,
    ];

    /// Weight of an interaction of this kind before decay.
    pub fn base_weight(&self) -> f64 {
        match self {
            InteractionKind::TextResponse => 1.0,
            InteractionKind::EmojiReaction => 1.5,
            InteractionKind::QuoteResponse => 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::TextResponse => "response",
            InteractionKind::QuoteResponse => "quotation",
            InteractionKind::EmojiReaction => "emoji",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "response" | "text" => Ok(InteractionKind::TextResponse),
            "quotation" | "quote" => Ok(InteractionKind::QuoteResponse),
            "emoji" | "reaction" => Ok(InteractionKind::EmojiReaction),
            other => anyhow::bail!(
                "Unknown interaction category '{other}'. Expected one of: response, quotation, emoji."
            ),
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether repeated reactions by one author to one message all count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactionPolicy {
    /// Every reaction row is an independent interaction (default)
    Every,
    /// Only the earliest reaction per (author, message) counts
    OncePerMessage,
}

impl ReactionPolicy {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "every" | "all" => Ok(ReactionPolicy::Every),
            "once-per-message" | "once" => Ok(ReactionPolicy::OncePerMessage),
            other => anyhow::bail!(
                "Unknown reaction policy '{other}'. Expected 'every' or 'once-per-message'."
            ),
        }
    }
}

/// One observed interaction: `source` responded to something `target` sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub source: ParticipantId,
    pub target: ParticipantId,
    pub kind: InteractionKind,
    /// When the response (reply, quote or reaction) was sent, epoch ms
    pub source_ts: i64,
    /// When the stimulus message was sent, epoch ms
    pub target_ts: i64,
    /// Seconds between stimulus and response, floored at zero
    pub elapsed_secs: f64,
}

/// Half-open `[start, end)` restriction on stimulus timestamps (epoch ms).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

impl TimeWindow {
    pub fn new(start_ms: Option<i64>, end_ms: Option<i64>) -> Result<Self> {
        if let (Some(start), Some(end)) = (start_ms, end_ms) {
            if start >= end {
                anyhow::bail!("Time window start ({start}) must be before its end ({end})");
            }
        }
        Ok(Self { start_ms, end_ms })
    }

    /// The unrestricted window.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.start_ms.is_none() && self.end_ms.is_none()
    }

    pub fn contains(&self, ts: i64) -> bool {
        self.start_ms.map_or(true, |start| ts >= start) && self.end_ms.map_or(true, |end| ts < end)
    }
}

/// Counts of everything that was dropped, clamped or skipped on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub messages_in_thread: usize,
    /// Quotes whose quoted timestamp matches no message in the thread
    pub quotes_unmatched: usize,
    /// Reactions whose message id matches no message at all
    pub reactions_unmatched: usize,
    /// Reactions to messages in other threads (not an error)
    pub reactions_outside_thread: usize,
    pub reactions_deduplicated: usize,
    pub self_interactions_excluded: usize,
    /// Interactions whose response predates the stimulus; elapsed floored at 0
    pub clock_skew_clamped: usize,
    /// Replies that explicitly quote their stimulus and count only as quotes
    pub text_responses_superseded: usize,
    pub mentions_in_thread: usize,
    /// Rows whose stimulus falls outside the requested window. They are set
    /// aside before any other check, so the counters above only describe
    /// rows inside the window. Unmatched quotes and reactions have no
    /// stimulus time and are always counted.
    pub outside_window: usize,
}

impl Diagnostics {
    /// Rows dropped because they referenced something that doesn't exist.
    pub fn integrity_gaps(&self) -> usize {
        self.quotes_unmatched + self.reactions_unmatched
    }
}

/// The three interaction sets for one thread, plus diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub text_responses: Vec<Interaction>,
    pub quote_responses: Vec<Interaction>,
    pub emoji_reactions: Vec<Interaction>,
    /// (mentioning author, mentioned participant) → count. Not weighted.
    pub mention_pairs: BTreeMap<(ParticipantId, ParticipantId), usize>,
    pub diagnostics: Diagnostics,
}

impl Extraction {
    /// Instances of one kind.
    pub fn of_kind(&self, kind: InteractionKind) -> &[Interaction] {
        match kind {
            InteractionKind::TextResponse => &self.text_responses,
            InteractionKind::QuoteResponse => &self.quote_responses,
            InteractionKind::EmojiReaction => &self.emoji_reactions,
        }
    }

    /// Every instance across all three kinds.
    pub fn all(&self) -> impl Iterator<Item = &Interaction> {
        self.text_responses
            .iter()
            .chain(&self.quote_responses)
            .chain(&self.emoji_reactions)
    }

    pub fn len(&self) -> usize {
        self.text_responses.len() + self.quote_responses.len() + self.emoji_reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extract all three interaction sets for one thread, over all time.
///
/// `tables` must already be remap-resolved.
pub fn extract(tables: &SignalTables, thread_id: i64, policy: ReactionPolicy) -> Extraction {
    extract_within(tables, thread_id, policy, &TimeWindow::all())
}

/// Extract the interactions whose stimulus was sent inside `window`.
///
/// The fold still walks the whole thread, so a reply just inside the window
/// finds its stimulus even when earlier history is excluded.
pub fn extract_within(
    tables: &SignalTables,
    thread_id: i64,
    policy: ReactionPolicy,
    window: &TimeWindow,
) -> Extraction {
    let mut diagnostics = Diagnostics::default();

    let mut thread_messages: Vec<&Message> = tables
        .messages
        .iter()
        .filter(|m| m.thread_id == thread_id)
        .collect();
    thread_messages.sort_by_key(|m| (m.date_sent, m.id));
    diagnostics.messages_in_thread = thread_messages.len();

    let quote_targets = resolve_quotes(&thread_messages);

    let quote_responses =
        extract_quote_responses(&thread_messages, &quote_targets, window, &mut diagnostics);
    let text_responses =
        extract_text_responses(&thread_messages, &quote_targets, window, &mut diagnostics);
    let emoji_reactions = extract_emoji_reactions(
        &tables.messages,
        &tables.reactions,
        thread_id,
        policy,
        window,
        &mut diagnostics,
    );
    let mention_pairs = count_mentions(tables, &thread_messages, thread_id, &mut diagnostics);

    debug!(
        thread_id,
        text = text_responses.len(),
        quotes = quote_responses.len(),
        emoji = emoji_reactions.len(),
        "Interactions extracted"
    );

    Extraction {
        text_responses,
        quote_responses,
        emoji_reactions,
        mention_pairs,
        diagnostics,
    }
}

/// Map each quoting message's id to the message it quotes, if found.
///
/// A quote points at the quoted message's `date_sent`. When several messages
/// in the thread share that timestamp, the lowest `_id` wins.
pub fn resolve_quotes<'a>(thread_messages: &[&'a Message]) -> HashMap<i64, &'a Message> {
    let mut by_sent: HashMap<i64, &'a Message> = HashMap::new();
    for &m in thread_messages {
        by_sent
            .entry(m.date_sent)
            .and_modify(|existing| {
                if m.id < existing.id {
                    *existing = m;
                }
            })
            .or_insert(m);
    }

    thread_messages
        .iter()
        .filter_map(|m| {
            let quoted_ts = m.quote_id?;
            by_sent.get(&quoted_ts).map(|&quoted| (m.id, quoted))
        })
        .collect()
}

/// Text responses via a single fold over time-ordered thread messages.
///
/// The fold carries the latest message and the latest message from a sender
/// other than the latest's. A message's stimulus is the most recent earlier
/// message from someone else; consecutive messages from one sender all answer
/// the same stimulus. The first message of a thread (and every message before
/// a second participant speaks) has no stimulus.
pub fn extract_text_responses(
    thread_messages: &[&Message],
    quote_targets: &HashMap<i64, &Message>,
    window: &TimeWindow,
    diagnostics: &mut Diagnostics,
) -> Vec<Interaction> {
    struct Fold<'a> {
        latest: Option<&'a Message>,
        previous_distinct: Option<&'a Message>,
        out: Vec<Interaction>,
    }

    let fold = thread_messages.iter().fold(
        Fold {
            latest: None,
            previous_distinct: None,
            out: Vec::new(),
        },
        |mut acc, &message| {
            let stimulus = match acc.latest {
                Some(latest) if latest.from_recipient_id != message.from_recipient_id => Some(latest),
                Some(_) => acc.previous_distinct,
                None => None,
            };

            let stimulus = match stimulus {
                Some(s) if !window.contains(s.date_sent) => {
                    diagnostics.outside_window += 1;
                    None
                }
                other => other,
            };

            if let Some(stimulus) = stimulus {
                let quotes_stimulus = quote_targets
                    .get(&message.id)
                    .is_some_and(|quoted| quoted.id == stimulus.id);
                if quotes_stimulus {
                    diagnostics.text_responses_superseded += 1;
                } else {
                    acc.out.push(Interaction {
                        source: message.from_recipient_id,
                        target: stimulus.from_recipient_id,
                        kind: InteractionKind::TextResponse,
                        source_ts: message.date_sent,
                        target_ts: stimulus.date_sent,
                        elapsed_secs: elapsed_secs(message.date_sent, stimulus.date_sent, diagnostics),
                    });
                }
            }

            if let Some(latest) = acc.latest {
                if latest.from_recipient_id != message.from_recipient_id {
                    acc.previous_distinct = Some(latest);
                }
            }
            acc.latest = Some(message);
            acc
        },
    );

    fold.out
}

/// Quote responses: every quoting message paired with the message it quotes.
pub fn extract_quote_responses(
    thread_messages: &[&Message],
    quote_targets: &HashMap<i64, &Message>,
    window: &TimeWindow,
    diagnostics: &mut Diagnostics,
) -> Vec<Interaction> {
    let mut out = Vec::new();

    for &message in thread_messages {
        let Some(quoted_ts) = message.quote_id else {
            continue;
        };
        let Some(&quoted) = quote_targets.get(&message.id) else {
            diagnostics.quotes_unmatched += 1;
            warn!(
                message_id = message.id,
                quoted_ts, "Quote references no message in this thread; dropping"
            );
            continue;
        };

        if !window.contains(quoted.date_sent) {
            diagnostics.outside_window += 1;
            continue;
        }

        if quoted.from_recipient_id == message.from_recipient_id {
            diagnostics.self_interactions_excluded += 1;
            continue;
        }

        out.push(Interaction {
            source: message.from_recipient_id,
            target: quoted.from_recipient_id,
            kind: InteractionKind::QuoteResponse,
            source_ts: message.date_sent,
            target_ts: quoted.date_sent,
            elapsed_secs: elapsed_secs(message.date_sent, quoted.date_sent, diagnostics),
        });
    }

    out
}

/// Emoji reactions to messages of the thread.
pub fn extract_emoji_reactions(
    messages: &[Message],
    reactions: &[Reaction],
    thread_id: i64,
    policy: ReactionPolicy,
    window: &TimeWindow,
    diagnostics: &mut Diagnostics,
) -> Vec<Interaction> {
    let by_id: HashMap<i64, &Message> = messages.iter().map(|m| (m.id, m)).collect();

    let mut ordered: Vec<&Reaction> = reactions.iter().collect();
    ordered.sort_by_key(|r| (r.date_sent, r.id));

    let mut seen: HashSet<(ParticipantId, i64)> = HashSet::new();
    let mut out = Vec::new();

    for reaction in ordered {
        let Some(&message) = by_id.get(&reaction.message_id) else {
            diagnostics.reactions_unmatched += 1;
            warn!(
                reaction_id = reaction.id,
                message_id = reaction.message_id,
                "Reaction references a missing message; dropping"
            );
            continue;
        };

        if message.thread_id != thread_id {
            diagnostics.reactions_outside_thread += 1;
            continue;
        }

        if !window.contains(message.date_sent) {
            diagnostics.outside_window += 1;
            continue;
        }

        if policy == ReactionPolicy::OncePerMessage
            && !seen.insert((reaction.author_id, reaction.message_id))
        {
            diagnostics.reactions_deduplicated += 1;
            continue;
        }

        if reaction.author_id == message.from_recipient_id {
            diagnostics.self_interactions_excluded += 1;
            continue;
        }

        out.push(Interaction {
            source: reaction.author_id,
            target: message.from_recipient_id,
            kind: InteractionKind::EmojiReaction,
            source_ts: reaction.date_sent,
            target_ts: message.date_sent,
            elapsed_secs: elapsed_secs(reaction.date_sent, message.date_sent, diagnostics),
        });
    }

    out
}

/// Count @-mentions in the thread by (author of the message, mentioned participant).
fn count_mentions(
    tables: &SignalTables,
    thread_messages: &[&Message],
    thread_id: i64,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<(ParticipantId, ParticipantId), usize> {
    let authors: HashMap<i64, ParticipantId> = thread_messages
        .iter()
        .map(|m| (m.id, m.from_recipient_id))
        .collect();

    let mut pairs = BTreeMap::new();
    for mention in tables.mentions.iter().filter(|m| m.thread_id == thread_id) {
        let Some(&author) = authors.get(&mention.message_id) else {
            continue;
        };
        diagnostics.mentions_in_thread += 1;
        if author != mention.recipient_id {
            *pairs.entry((author, mention.recipient_id)).or_insert(0) += 1;
        }
    }
    pairs
}

/// Seconds from `stimulus_ms` to `response_ms`, floored at zero.
fn elapsed_secs(response_ms: i64, stimulus_ms: i64, diagnostics: &mut Diagnostics) -> f64 {
    let diff = response_ms - stimulus_ms;
    if diff < 0 {
        diagnostics.clock_skew_clamped += 1;
        0.0
    } else {
        diff as f64 / 1000.0
    }
}
