// Recipient remapping and participant labels.
//
// Signal occasionally retires a recipient id and records the replacement in
// `remapped_recipients`. The remap is applied once, up front, to every
// participant reference; later stages only ever see resolved ids.

use std::collections::{BTreeMap, HashMap};

use crate::signal::models::{ParticipantId, Recipient, RecipientRemap, SignalTables};

/// Lookup from retired recipient id to its replacement.
#[derive(Debug, Clone, Default)]
pub struct RemapTable {
    map: HashMap<ParticipantId, ParticipantId>,
}

impl RemapTable {
    pub fn from_rows(rows: &[RecipientRemap]) -> Self {
        let map = rows
            .iter()
            .filter(|r| r.old_id != r.new_id)
            .map(|r| (r.old_id, r.new_id))
            .collect();
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Resolve an id through the remap, following chains (a→b, b→c gives c).
    ///
    /// Ids without an entry pass through unchanged. Every id that reaches a
    /// cycle (a→b, b→a) resolves to the smallest id on that cycle, so the
    /// members collapse onto one participant.
    pub fn resolve(&self, id: ParticipantId) -> ParticipantId {
        let mut path = vec![id];
        let mut current = id;
        while let Some(&next) = self.map.get(&current) {
            if let Some(start) = path.iter().position(|&p| p == next) {
                return path[start..].iter().copied().min().unwrap_or(next);
            }
            path.push(next);
            current = next;
        }
        current
    }
}

/// Apply the remap to every participant reference in the tables.
///
/// Recipients that collapse onto the same resolved id are merged, keeping
/// the first non-empty value of each label field.
pub fn resolve_tables(tables: &SignalTables, remap: &RemapTable) -> SignalTables {
    let messages = tables
        .messages
        .iter()
        .map(|m| {
            let mut m = m.clone();
            m.from_recipient_id = remap.resolve(m.from_recipient_id);
            m.to_recipient_id = m.to_recipient_id.map(|id| remap.resolve(id));
            m
        })
        .collect();

    let reactions = tables
        .reactions
        .iter()
        .map(|r| {
            let mut r = r.clone();
            r.author_id = remap.resolve(r.author_id);
            r
        })
        .collect();

    let mentions = tables
        .mentions
        .iter()
        .map(|m| {
            let mut m = m.clone();
            m.recipient_id = remap.resolve(m.recipient_id);
            m
        })
        .collect();

    let mut merged: BTreeMap<ParticipantId, Recipient> = BTreeMap::new();
    for recipient in &tables.recipients {
        let id = remap.resolve(recipient.id);
        match merged.get_mut(&id) {
            Some(existing) => {
                fill(&mut existing.uuid, &recipient.uuid);
                fill(&mut existing.group_id, &recipient.group_id);
                fill(&mut existing.profile_joined_name, &recipient.profile_joined_name);
                fill(&mut existing.system_joined_name, &recipient.system_joined_name);
            }
            None => {
                let mut r = recipient.clone();
                r.id = id;
                merged.insert(id, r);
            }
        }
    }

    SignalTables {
        messages,
        mentions,
        reactions,
        recipients: merged.into_values().collect(),
        remaps: tables.remaps.clone(),
    }
}

fn fill(slot: &mut Option<String>, candidate: &Option<String>) {
    let empty = slot.as_deref().map_or(true, str::is_empty);
    if empty {
        if let Some(value) = candidate.as_deref().filter(|v| !v.is_empty()) {
            *slot = Some(value.to_string());
        }
    }
}

/// Display labels for resolved participant ids.
#[derive(Debug, Clone, Default)]
pub struct ParticipantDirectory {
    labels: HashMap<ParticipantId, String>,
}

impl ParticipantDirectory {
    /// Build from (already resolved) recipients.
    ///
    /// Label preference: profile name, then system contact name, then uuid.
    pub fn from_recipients(recipients: &[Recipient]) -> Self {
        let labels = recipients
            .iter()
            .filter_map(|r| {
                [&r.profile_joined_name, &r.system_joined_name, &r.uuid]
                    .into_iter()
                    .flatten()
                    .find(|v| !v.trim().is_empty())
                    .map(|label| (r.id, label.trim().to_string()))
            })
            .collect();
        Self { labels }
    }

    /// The participant's label, or `#<id>` when none is known.
    pub fn label(&self, id: ParticipantId) -> String {
        self.labels
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("#{id}"))
    }
}
