// Edge aggregation: collapses weighted interactions into one directed edge
// per (source, target) pair.
//
// The table is keyed by a BTreeMap so rows always come out sorted by source
// id, then target id. Each edge's contributions are summed in ascending
// order, which makes the result bit-identical regardless of the order the
// interactions arrived in.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::decay::WeightedInteraction;
use super::interactions::InteractionKind;
use crate::signal::models::ParticipantId;

/// Weight and instance count contributed by one interaction kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindTotal {
    pub weight: f64,
    pub count: usize,
}

/// One aggregated directed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: ParticipantId,
    pub target: ParticipantId,
    /// Sum of decayed weights of every instance on this pair
    pub weight: f64,
    /// Number of interaction instances on this pair
    pub interactions: usize,
    pub by_kind: BTreeMap<InteractionKind, KindTotal>,
}

/// The aggregated graph as a table of edges, sorted by (source, target).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeTable {
    edges: Vec<Edge>,
}

impl EdgeTable {
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Participants that appear as the source or target of any edge, ascending.
    pub fn nodes(&self) -> Vec<ParticipantId> {
        self.edges
            .iter()
            .flat_map(|e| [e.source, e.target])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn get(&self, source: ParticipantId, target: ParticipantId) -> Option<&Edge> {
        self.edges
            .binary_search_by_key(&(source, target), |e| (e.source, e.target))
            .ok()
            .map(|i| &self.edges[i])
    }

    /// Edges leaving `source`, in target id order.
    pub fn outgoing(&self, source: ParticipantId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.source == source)
    }

    /// The table restricted to one interaction category.
    ///
    /// Each kept edge carries only that kind's weight and count. A category
    /// with no instances gives an empty table.
    pub fn filter_kind(&self, kind: InteractionKind) -> EdgeTable {
        let edges = self
            .edges
            .iter()
            .filter_map(|e| {
                let total = e.by_kind.get(&kind)?;
                Some(Edge {
                    source: e.source,
                    target: e.target,
                    weight: total.weight,
                    interactions: total.count,
                    by_kind: BTreeMap::from([(kind, *total)]),
                })
            })
            .collect();
        EdgeTable { edges }
    }
}

/// Group weighted interactions by ordered pair and sum their weights.
///
/// Self-interactions are never turned into edges; the extractor already
/// drops them, so meeting one here is logged.
pub fn aggregate(items: &[WeightedInteraction]) -> EdgeTable {
    let mut grouped: BTreeMap<(ParticipantId, ParticipantId), Vec<(InteractionKind, f64)>> =
        BTreeMap::new();

    for item in items {
        let i = &item.interaction;
        if i.source == i.target {
            warn!(participant = i.source, kind = i.kind.as_str(), "Skipping self-interaction");
            continue;
        }
        grouped
            .entry((i.source, i.target))
            .or_default()
            .push((i.kind, item.weight));
    }

    let edges = grouped
        .into_iter()
        .map(|((source, target), contributions)| {
            let by_kind = InteractionKind::ALL
                .iter()
                .filter_map(|&kind| {
                    let weights: Vec<f64> = contributions
                        .iter()
                        .filter(|(k, _)| *k == kind)
                        .map(|(_, w)| *w)
                        .collect();
                    if weights.is_empty() {
                        return None;
                    }
                    let count = weights.len();
                    Some((
                        kind,
                        KindTotal {
                            weight: sorted_sum(weights),
                            count,
                        },
                    ))
                })
                .collect();

            Edge {
                source,
                target,
                weight: sorted_sum(contributions.iter().map(|(_, w)| *w).collect()),
                interactions: contributions.len(),
                by_kind,
            }
        })
        .collect();

    EdgeTable { edges }
}

/// Sum in ascending order so the result doesn't depend on input order.
fn sorted_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    values.into_iter().fold(0.0, |acc, v| acc + v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::interactions::Interaction;

    fn weighted(source: i64, target: i64, kind: InteractionKind, weight: f64) -> WeightedInteraction {
        WeightedInteraction {
            interaction: Interaction {
                source,
                target,
                kind,
                source_ts: 0,
                target_ts: 0,
                elapsed_secs: 0.0,
            },
            weight,
        }
    }

    #[test]
    fn repeated_pairs_are_summed() {
        let table = aggregate(&[
            weighted(2, 1, InteractionKind::TextResponse, 0.5),
            weighted(2, 1, InteractionKind::EmojiReaction, 1.25),
            weighted(1, 2, InteractionKind::QuoteResponse, 2.0),
        ]);
        assert_eq!(table.len(), 2);

        let edge = table.get(2, 1).unwrap();
        assert!((edge.weight - 1.75).abs() < 1e-12);
        assert_eq!(edge.interactions, 2);
        assert_eq!(edge.by_kind[&InteractionKind::TextResponse].count, 1);

        // Direction matters: 1→2 is a separate edge
        assert!((table.get(1, 2).unwrap().weight - 2.0).abs() < 1e-12);
    }

    #[test]
    fn rows_sorted_by_source_then_target() {
        let table = aggregate(&[
            weighted(3, 1, InteractionKind::TextResponse, 1.0),
            weighted(1, 3, InteractionKind::TextResponse, 1.0),
            weighted(1, 2, InteractionKind::TextResponse, 1.0),
        ]);
        let keys: Vec<(i64, i64)> = table.edges().iter().map(|e| (e.source, e.target)).collect();
        assert_eq!(keys, vec![(1, 2), (1, 3), (3, 1)]);
        assert_eq!(table.nodes(), vec![1, 2, 3]);
    }

    #[test]
    fn self_interactions_never_become_edges() {
        let table = aggregate(&[weighted(4, 4, InteractionKind::EmojiReaction, 1.5)]);
        assert!(table.is_empty());
        assert!(table.nodes().is_empty());
    }

    #[test]
    fn filter_kind_keeps_only_that_category() {
        let table = aggregate(&[
            weighted(2, 1, InteractionKind::TextResponse, 0.5),
            weighted(2, 1, InteractionKind::EmojiReaction, 1.25),
            weighted(3, 1, InteractionKind::TextResponse, 0.75),
        ]);
        let emoji = table.filter_kind(InteractionKind::EmojiReaction);
        assert_eq!(emoji.len(), 1);
        assert!((emoji.get(2, 1).unwrap().weight - 1.25).abs() < 1e-12);

        assert!(table.filter_kind(InteractionKind::QuoteResponse).is_empty());
    }
}
