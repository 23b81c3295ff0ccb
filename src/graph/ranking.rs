// Rankings derived from the aggregated edge table.
//
// Influence: eigenvector centrality of the weighted directed graph. A
// participant scores highly when heavily-weighted edges point at them from
// participants who themselves score highly.
//
// Outward response: for one participant, who they respond to most, by
// aggregated edge weight.
//
// Both are pure functions of the EdgeTable. Ties are broken by ascending
// participant id so the order is total and reproducible.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::aggregate::EdgeTable;
use crate::error::PipelineError;
use crate::signal::models::ParticipantId;

/// Power iteration limits for eigenvector centrality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerIteration {
    pub max_iterations: usize,
    /// Converged when the summed absolute change is below `n * tolerance`
    pub tolerance: f64,
}

impl Default for PowerIteration {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

/// One row of the Influence Ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceRow {
    pub participant_id: ParticipantId,
    pub rank: usize,
    pub score: f64,
}

/// One row of an Outward Response Ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutwardRow {
    pub source_id: ParticipantId,
    pub target_id: ParticipantId,
    pub rank: usize,
    pub score: f64,
}

/// Build a petgraph DiGraph from the edge table.
///
/// Returns the graph and the participant id behind each node index.
pub fn build_graph(table: &EdgeTable) -> (DiGraph<ParticipantId, f64>, BTreeMap<ParticipantId, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut index: BTreeMap<ParticipantId, NodeIndex> = BTreeMap::new();

    for participant in table.nodes() {
        index.insert(participant, graph.add_node(participant));
    }

    for edge in table.edges() {
        if let (Some(&a), Some(&b)) = (index.get(&edge.source), index.get(&edge.target)) {
            graph.add_edge(a, b, edge.weight);
        }
    }

    (graph, index)
}

/// Eigenvector centrality by power iteration on `(A + I)ᵀ`.
///
/// Starts from a uniform vector and normalises to unit Euclidean length
/// after every step. The identity shift keeps the iteration from
/// oscillating on bipartite or cyclic graphs.
pub fn eigenvector_centrality(
    table: &EdgeTable,
    params: PowerIteration,
) -> Result<BTreeMap<ParticipantId, f64>, PipelineError> {
    let (graph, _) = build_graph(table);
    let n = graph.node_count();
    if n == 0 || graph.edge_count() == 0 {
        return Err(PipelineError::EmptyGraph);
    }

    let mut x = vec![1.0 / n as f64; n];

    for iteration in 1..=params.max_iterations {
        let last = x.clone();

        for edge in graph.edge_references() {
            x[edge.target().index()] += last[edge.source().index()] * *edge.weight();
        }

        let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        let norm = if norm > 0.0 { norm } else { 1.0 };
        for v in x.iter_mut() {
            *v /= norm;
        }

        let delta: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if delta < n as f64 * params.tolerance {
            debug!(iteration, nodes = n, "Eigenvector centrality converged");
            return Ok(graph
                .node_indices()
                .map(|idx| (graph[idx], x[idx.index()]))
                .collect());
        }
    }

    Err(PipelineError::DidNotConverge {
        iterations: params.max_iterations,
        tolerance: params.tolerance,
    })
}

/// Influence Ranking: participants by eigenvector centrality, rank 1 highest.
pub fn influence_ranking(
    table: &EdgeTable,
    params: PowerIteration,
) -> Result<Vec<InfluenceRow>, PipelineError> {
    let scores = eigenvector_centrality(table, params)?;

    let mut ordered: Vec<(ParticipantId, f64)> = scores.into_iter().collect();
    ordered.sort_by(|a, b| by_score_then_id(a.1, a.0, b.1, b.0));

    Ok(ordered
        .into_iter()
        .enumerate()
        .map(|(i, (participant_id, score))| InfluenceRow {
            participant_id,
            rank: i + 1,
            score,
        })
        .collect())
}

/// Outward Response Ranking for one source: its targets by edge weight.
///
/// A participant with no outgoing edges gets an empty ranking.
pub fn outward_response_ranking(table: &EdgeTable, source: ParticipantId) -> Vec<OutwardRow> {
    let mut targets: Vec<(ParticipantId, f64)> = table
        .outgoing(source)
        .map(|e| (e.target, e.weight))
        .collect();
    targets.sort_by(|a, b| by_score_then_id(a.1, a.0, b.1, b.0));

    targets
        .into_iter()
        .enumerate()
        .map(|(i, (target_id, score))| OutwardRow {
            source_id: source,
            target_id,
            rank: i + 1,
            score,
        })
        .collect()
}

/// Outward Response Rankings for every participant with outgoing edges.
pub fn outward_response_rankings(table: &EdgeTable) -> BTreeMap<ParticipantId, Vec<OutwardRow>> {
    let mut sources: Vec<ParticipantId> = table.edges().iter().map(|e| e.source).collect();
    sources.dedup();

    sources
        .into_iter()
        .map(|source| (source, outward_response_ranking(table, source)))
        .collect()
}

/// Descending score, then ascending id.
fn by_score_then_id(
    score_a: f64,
    id_a: ParticipantId,
    score_b: f64,
    id_b: ParticipantId,
) -> Ordering {
    score_b.total_cmp(&score_a).then(id_a.cmp(&id_b))
}
