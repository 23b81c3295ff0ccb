// Network pipeline: Signal tables → interactions → decayed weights → edge table.
//
// Rankings are not computed here. PipelineOutput offers them on demand, so a
// ranking failure (e.g. an empty graph) never takes the edge table with it.

use std::collections::BTreeMap;

use anyhow::Result;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::graph::aggregate::{self, EdgeTable};
use crate::graph::decay::{self, HalfLife, WeightedInteraction};
use crate::graph::interactions::{self, Diagnostics, InteractionKind, ReactionPolicy, TimeWindow};
use crate::graph::ranking::{self, InfluenceRow, OutwardRow, PowerIteration};
use crate::graph::remap::{self, ParticipantDirectory, RemapTable};
use crate::signal::models::{ParticipantId, SignalTables};
use crate::signal::queries;

/// Everything that shapes one run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub thread_id: i64,
    pub window: TimeWindow,
    pub reaction_policy: ReactionPolicy,
    /// Must be positive and finite; `run` rejects anything else
    pub default_half_life_secs: f64,
    /// Restrict the graph to one interaction category
    pub kind: Option<InteractionKind>,
    pub power_iteration: PowerIteration,
}

impl PipelineOptions {
    pub fn new(thread_id: i64) -> Self {
        Self {
            thread_id,
            window: TimeWindow::all(),
            reaction_policy: ReactionPolicy::Every,
            default_half_life_secs: decay::DEFAULT_HALF_LIFE_SECS,
            kind: None,
            power_iteration: PowerIteration::default(),
        }
    }

    pub fn from_config(config: &Config, window: TimeWindow) -> Self {
        Self {
            thread_id: config.thread_id,
            window,
            reaction_policy: config.reaction_policy,
            default_half_life_secs: config.default_half_life_secs,
            kind: None,
            power_iteration: PowerIteration::default(),
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_kind(mut self, kind: Option<InteractionKind>) -> Self {
        self.kind = kind;
        self
    }
}

/// The result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub thread_id: i64,
    pub window: TimeWindow,
    pub kind: Option<InteractionKind>,
    /// The aggregated graph (`nodes_edges`)
    pub edges: EdgeTable,
    /// Every weighted interaction that went into `edges`
    pub weighted: Vec<WeightedInteraction>,
    pub half_lives: BTreeMap<InteractionKind, HalfLife>,
    pub diagnostics: Diagnostics,
    pub mention_pairs: BTreeMap<(ParticipantId, ParticipantId), usize>,
    pub directory: ParticipantDirectory,
    remap: RemapTable,
    power_iteration: PowerIteration,
}

impl PipelineOutput {
    /// No interactions in this thread/window. Not an error.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn influence(&self) -> Result<Vec<InfluenceRow>, PipelineError> {
        ranking::influence_ranking(&self.edges, self.power_iteration)
    }

    /// Outward ranking for `source`. A retired recipient id is resolved
    /// first, so it ranks the same as the id it was remapped to.
    pub fn outward(&self, source: ParticipantId) -> Vec<OutwardRow> {
        ranking::outward_response_ranking(&self.edges, self.resolve(source))
    }

    pub fn outward_all(&self) -> BTreeMap<ParticipantId, Vec<OutwardRow>> {
        ranking::outward_response_rankings(&self.edges)
    }

    /// The id a raw recipient id was remapped to (itself if none).
    pub fn resolve(&self, id: ParticipantId) -> ParticipantId {
        self.remap.resolve(id)
    }

    pub fn label(&self, id: ParticipantId) -> String {
        self.directory.label(self.resolve(id))
    }
}

/// Run the pipeline over already-loaded tables.
///
/// Order matters: remap first, then extract the window's interactions, and
/// only then estimate half-lives, so the decay adapts to the window's
/// own tempo. Half-lives are estimated over every kind even when `kind`
/// narrows the graph.
///
/// Fails only on an unusable `default_half_life_secs`.
pub fn run(tables: &SignalTables, options: &PipelineOptions) -> Result<PipelineOutput, PipelineError> {
    let remap_table = RemapTable::from_rows(&tables.remaps);
    let resolved = remap::resolve_tables(tables, &remap_table);
    let directory = ParticipantDirectory::from_recipients(&resolved.recipients);

    let extraction = interactions::extract_within(
        &resolved,
        options.thread_id,
        options.reaction_policy,
        &options.window,
    );

    let half_lives = decay::estimate_half_lives(&extraction, options.default_half_life_secs)?;
    let mut weighted = decay::weigh(&extraction, &half_lives);
    let mut edges = aggregate::aggregate(&weighted);
    if let Some(kind) = options.kind {
        weighted.retain(|w| w.interaction.kind == kind);
        edges = edges.filter_kind(kind);
    }

    let diagnostics = extraction.diagnostics.clone();
    if diagnostics.integrity_gaps() > 0 {
        warn!(
            quotes_unmatched = diagnostics.quotes_unmatched,
            reactions_unmatched = diagnostics.reactions_unmatched,
            "Dropped rows referencing missing messages"
        );
    }

    info!(
        thread_id = options.thread_id,
        remapped_ids = remap_table.len(),
        text = extraction.text_responses.len(),
        quotes = extraction.quote_responses.len(),
        emoji = extraction.emoji_reactions.len(),
        kind = options.kind.map_or("all", |k| k.as_str()),
        edges = edges.len(),
        nodes = edges.nodes().len(),
        "Network built"
    );

    Ok(PipelineOutput {
        thread_id: options.thread_id,
        window: options.window,
        kind: options.kind,
        edges,
        weighted,
        half_lives,
        diagnostics,
        mention_pairs: extraction.mention_pairs,
        directory,
        remap: remap_table,
        power_iteration: options.power_iteration,
    })
}

/// Validate, load and run against an open database.
///
/// A schema violation or an invalid half-life aborts here, before any
/// output exists.
pub fn run_from_database(conn: &Connection, options: &PipelineOptions) -> Result<PipelineOutput> {
    let tables = queries::load_tables(conn)?;
    Ok(run(&tables, options)?)
}
