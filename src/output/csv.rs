// File export for the edge table and the rankings.
//
// Every column is an integer id or an f64, so rows are written directly
// without a quoting layer. Floats use Rust's shortest round-trip
// representation: identical input gives a byte-identical file.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::graph::aggregate::EdgeTable;
use crate::graph::ranking::{InfluenceRow, OutwardRow};
use crate::signal::models::ParticipantId;

pub const EDGES_FILE: &str = "nodes_edges.csv";
pub const INFLUENCE_FILE: &str = "influence_ranking.csv";
pub const OUTWARD_FILE: &str = "outward_ranking.csv";
pub const INFLUENCE_JSON_FILE: &str = "influence_ranking.json";
pub const OUTWARD_JSON_FILE: &str = "outward_ranking.json";

/// Write `source_id,target_id,weight`, one row per edge in table order.
pub fn write_edges(path: &Path, table: &EdgeTable) -> Result<()> {
    let mut out = create(path)?;
    writeln!(out, "source_id,target_id,weight")?;
    for edge in table.edges() {
        writeln!(out, "{},{},{}", edge.source, edge.target, edge.weight)?;
    }
    out.flush()?;

    info!(path = %path.display(), rows = table.len(), "Wrote edge table");
    Ok(())
}

pub fn write_influence(path: &Path, rows: &[InfluenceRow]) -> Result<()> {
    let mut out = create(path)?;
    writeln!(out, "participant_id,rank,score")?;
    for row in rows {
        writeln!(out, "{},{},{}", row.participant_id, row.rank, row.score)?;
    }
    out.flush()?;

    info!(path = %path.display(), rows = rows.len(), "Wrote influence ranking");
    Ok(())
}

/// Write one or more outward rankings into a single table, sources ascending.
pub fn write_outward(path: &Path, rankings: &BTreeMap<ParticipantId, Vec<OutwardRow>>) -> Result<()> {
    let mut out = create(path)?;
    writeln!(out, "source_id,target_id,rank,score")?;
    let mut written = 0;
    for row in rankings.values().flatten() {
        writeln!(out, "{},{},{},{}", row.source_id, row.target_id, row.rank, row.score)?;
        written += 1;
    }
    out.flush()?;

    info!(path = %path.display(), rows = written, "Wrote outward ranking");
    Ok(())
}

/// Pretty-printed JSON export of any serializable ranking.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut out = create(path)?;
    serde_json::to_writer_pretty(&mut out, value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    writeln!(out)?;
    out.flush()?;

    info!(path = %path.display(), "Wrote JSON export");
    Ok(())
}

/// `dir/file`, creating `dir` if needed.
pub fn output_path(dir: &Path, file: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    Ok(dir.join(file))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::aggregate::aggregate;
    use crate::graph::decay::WeightedInteraction;
    use crate::graph::interactions::{Interaction, InteractionKind};

    fn weighted(source: i64, target: i64, weight: f64) -> WeightedInteraction {
        WeightedInteraction {
            interaction: Interaction {
                source,
                target,
                kind: InteractionKind::QuoteResponse,
                source_ts: 0,
                target_ts: 0,
                elapsed_secs: 0.0,
            },
            weight,
        }
    }

    #[test]
    fn edge_file_has_header_and_rows_in_table_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EDGES_FILE);
        let table = aggregate(&[weighted(2, 1, 0.25), weighted(1, 2, 2.0)]);

        write_edges(&path, &table).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "source_id,target_id,weight\n1,2,2\n2,1,0.25\n");
    }

    #[test]
    fn weights_round_trip_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EDGES_FILE);
        let w = 1.0 / 3.0;
        write_edges(&path, &aggregate(&[weighted(1, 2, w)])).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let last = text.lines().last().unwrap();
        let parsed: f64 = last.rsplit(',').next().unwrap().parse().unwrap();
        assert_eq!(parsed.to_bits(), w.to_bits());
    }

    #[test]
    fn output_path_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let path = output_path(&nested, INFLUENCE_FILE).unwrap();
        assert!(nested.is_dir());
        assert_eq!(path, nested.join(INFLUENCE_FILE));
    }
}
