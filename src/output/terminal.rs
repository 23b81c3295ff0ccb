// Colored terminal output for edge tables, rankings and run diagnostics.
//
// main.rs delegates all display here. Participants are shown by their
// directory label with the numeric id alongside.

use colored::Colorize;

use crate::graph::interactions::InteractionKind;
use crate::graph::ranking::{InfluenceRow, OutwardRow};
use crate::pipeline::PipelineOutput;

use super::truncate_chars;

const LABEL_WIDTH: usize = 24;

/// Display the aggregated edge table, heaviest edges first.
pub fn display_edges(output: &PipelineOutput, limit: usize) {
    if output.is_empty() {
        println!("No data for this thread/window.");
        return;
    }

    println!(
        "\n{}",
        format!(
            "=== Interaction Network (thread {}, {}, {} edges, {} participants) ===",
            output.thread_id,
            output.kind.map_or("all kinds", |k| k.as_str()),
            output.edges.len(),
            output.edges.nodes().len()
        )
        .bold()
    );
    println!();
    println!(
        "  {:<width$} {:<width$} {:>10}  {:>5}  {}",
        "From".dimmed(),
        "To".dimmed(),
        "Weight".dimmed(),
        "Count".dimmed(),
        "Kinds".dimmed(),
        width = LABEL_WIDTH,
    );
    println!("  {}", "-".repeat(LABEL_WIDTH * 2 + 40).dimmed());

    let mut edges: Vec<_> = output.edges.edges().iter().collect();
    edges.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    for edge in edges.iter().take(limit) {
        let kinds: Vec<String> = InteractionKind::ALL
            .iter()
            .filter_map(|kind| {
                edge.by_kind
                    .get(kind)
                    .map(|t| format!("{}:{}", kind.as_str(), t.count))
            })
            .collect();
        println!(
            "  {:<width$} {:<width$} {:>10.4}  {:>5}  {}",
            participant(output, edge.source),
            participant(output, edge.target),
            edge.weight,
            edge.interactions,
            kinds.join(" ").dimmed(),
            width = LABEL_WIDTH,
        );
    }

    if edges.len() > limit {
        println!("  {}", format!("... {} more", edges.len() - limit).dimmed());
    }
}

/// Display the Influence Ranking.
pub fn display_influence(output: &PipelineOutput, rows: &[InfluenceRow]) {
    println!("\n{}", "=== Influence Ranking ===".bold());
    println!();
    println!(
        "  {:>4}  {:<width$} {:>10}",
        "Rank".dimmed(),
        "Participant".dimmed(),
        "Score".dimmed(),
        width = LABEL_WIDTH,
    );
    println!("  {}", "-".repeat(LABEL_WIDTH + 18).dimmed());

    for row in rows {
        let score = format!("{:.4}", row.score);
        let score = match row.rank {
            1 => score.green().bold(),
            2 | 3 => score.green(),
            _ => score.normal(),
        };
        println!(
            "  {:>4}. {:<width$} {:>10}",
            row.rank,
            participant(output, row.participant_id),
            score,
            width = LABEL_WIDTH,
        );
    }
}

/// Display one participant's Outward Response Ranking.
pub fn display_outward(output: &PipelineOutput, source: i64, rows: &[OutwardRow]) {
    println!(
        "\n{}",
        format!("=== Who {} responds to ===", participant(output, source)).bold()
    );

    if rows.is_empty() {
        println!("  {}", "No outgoing interactions in this thread/window.".dimmed());
        return;
    }

    println!();
    for row in rows {
        println!(
            "  {:>4}. {:<width$} {:>10.4}",
            row.rank,
            participant(output, row.target_id),
            row.score,
            width = LABEL_WIDTH,
        );
    }
}

/// Display per-kind half-lives and the run's diagnostics counters.
pub fn display_diagnostics(output: &PipelineOutput) {
    println!("\n{}", "=== Decay ===".bold());
    for (kind, half_life) in &output.half_lives {
        let note = if half_life.fallback {
            "fallback".yellow().to_string()
        } else {
            "median".green().to_string()
        };
        println!(
            "  {:<10} half-life {:>10.1}s  ({} samples, {})",
            kind.as_str(),
            half_life.seconds,
            half_life.samples,
            note
        );
    }

    let d = &output.diagnostics;
    println!("\n{}", "=== Diagnostics ===".bold());
    println!("  Messages in thread:        {}", d.messages_in_thread);
    println!("  Mentions in thread:        {}", d.mentions_in_thread);
    println!("  Self-interactions skipped: {}", d.self_interactions_excluded);
    println!("  Replies counted as quotes: {}", d.text_responses_superseded);
    println!("  Reactions in other thread: {}", d.reactions_outside_thread);
    println!("  Reactions deduplicated:    {}", d.reactions_deduplicated);
    if !output.window.is_unbounded() {
        println!("  Outside time window:       {}", d.outside_window);
    }

    let skew = d.clock_skew_clamped.to_string();
    let skew = if d.clock_skew_clamped > 0 { skew.yellow() } else { skew.normal() };
    println!("  Clock skew clamped:        {}", skew);

    let gaps = d.integrity_gaps();
    if gaps > 0 {
        println!(
            "  {} {} rows referenced missing messages ({} quotes, {} reactions)",
            "!".bright_red(),
            gaps,
            d.quotes_unmatched,
            d.reactions_unmatched
        );
    } else {
        println!("  {} No integrity gaps", "ok".green());
    }
}

fn participant(output: &PipelineOutput, id: i64) -> String {
    let label = truncate_chars(&output.label(id), LABEL_WIDTH - 8);
    format!("{label} ({id})")
}
