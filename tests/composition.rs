// Composition tests: verifying that the stages chain together correctly.
//
// These tests exercise the data flow between modules:
//   SQLite tables -> remap -> extraction -> decay -> aggregation -> rankings
// against in-memory databases seeded through signal::mock, plus temp files
// for the export path.

use std::fs;

use amongfriends::error::PipelineError;
use amongfriends::graph::decay::{decay_weight, DEFAULT_HALF_LIFE_SECS};
use amongfriends::graph::interactions::{InteractionKind, TimeWindow};
use amongfriends::output::csv;
use amongfriends::pipeline::{self, PipelineOptions};
use amongfriends::signal::models::{Message, Reaction, RecipientRemap, SignalTables};
use amongfriends::signal::{self, mock, queries};
use rusqlite::Connection;

fn seeded_connection(seed: u64, messages: usize) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    mock::create_schema(&conn).unwrap();
    mock::seed_tables(&conn, seed, messages).unwrap();
    conn
}

fn msg(id: i64, date_sent: i64, from: i64) -> Message {
    Message {
        id,
        date_sent,
        date_received: date_sent,
        thread_id: 2,
        from_recipient_id: from,
        to_recipient_id: None,
        quote_id: None,
        body: None,
    }
}

// ============================================================
// Chain: mock database -> full pipeline
// ============================================================

#[test]
fn mock_dataset_builds_a_network() {
    let conn = seeded_connection(7, 120);
    let output =
        pipeline::run_from_database(&conn, &PipelineOptions::new(mock::MOCK_GROUP_THREAD)).unwrap();

    assert!(!output.is_empty());
    assert!(output.edges.edges().iter().all(|e| e.source != e.target));
    assert!(output.edges.edges().iter().all(|e| e.weight > 0.0 && e.weight.is_finite()));

    // The retired recipient id never survives the remap
    assert!(!output.edges.nodes().contains(&mock::MOCK_REMAPPED_OLD_ID));

    // 120 random messages plus the planted dangling quote
    assert_eq!(output.diagnostics.messages_in_thread, 121);
    assert!(output.diagnostics.quotes_unmatched >= 1);
    assert_eq!(output.diagnostics.reactions_unmatched, 1);
    assert!(output.diagnostics.clock_skew_clamped >= 1);
    assert!(output.diagnostics.self_interactions_excluded >= 1);

    assert_eq!(output.label(1), "Alex");
    assert_eq!(output.label(404), "#404");
}

#[test]
fn mock_dataset_ranks_every_participant() {
    let conn = seeded_connection(7, 120);
    let output =
        pipeline::run_from_database(&conn, &PipelineOptions::new(mock::MOCK_GROUP_THREAD)).unwrap();

    let ranking = output.influence().unwrap();
    assert_eq!(ranking.len(), output.edges.nodes().len());
    assert_eq!(ranking[0].rank, 1);
    assert!(ranking.windows(2).all(|w| w[0].score >= w[1].score));

    let outward = output.outward_all();
    for (source, rows) in &outward {
        assert!(rows.iter().all(|r| r.source_id == *source && r.target_id != *source));
    }
}

#[test]
fn edge_weight_is_sum_of_its_interactions() {
    let conn = seeded_connection(11, 80);
    let output =
        pipeline::run_from_database(&conn, &PipelineOptions::new(mock::MOCK_GROUP_THREAD)).unwrap();

    for edge in output.edges.edges() {
        let expected: f64 = output
            .weighted
            .iter()
            .filter(|w| w.interaction.source == edge.source && w.interaction.target == edge.target)
            .map(|w| w.weight)
            .sum();
        assert!(
            (edge.weight - expected).abs() < 1e-9,
            "Edge {}->{} weight {} != sum {}",
            edge.source,
            edge.target,
            edge.weight,
            expected
        );
    }
}

// ============================================================
// Worked scenarios
// ============================================================

#[test]
fn reply_and_reaction_sum_into_one_edge() {
    const A: i64 = 1;
    const B: i64 = 2;

    let tables = SignalTables {
        messages: vec![msg(1, 0, A), msg(2, 10_000, B)],
        reactions: vec![Reaction {
            id: 1,
            message_id: 1,
            author_id: B,
            emoji: "👍".to_string(),
            date_sent: 5_000,
        }],
        ..Default::default()
    };

    let output = pipeline::run(&tables, &PipelineOptions::new(2)).unwrap();

    // One sample per kind: both half-lives fall back to the default
    for kind in [InteractionKind::TextResponse, InteractionKind::EmojiReaction] {
        let hl = output.half_lives[&kind];
        assert!(hl.fallback);
        assert_eq!(hl.seconds, DEFAULT_HALF_LIFE_SECS);
    }

    let text = 1.0 * (-10.0 / DEFAULT_HALF_LIFE_SECS).exp2();
    let emoji = 1.5 * (-5.0 / DEFAULT_HALF_LIFE_SECS).exp2();

    assert_eq!(output.edges.len(), 1);
    let edge = output.edges.get(B, A).unwrap();
    assert!(
        (edge.weight - (text + emoji)).abs() < 1e-12,
        "Expected {}, got {}",
        text + emoji,
        edge.weight
    );
    assert!((edge.by_kind[&InteractionKind::TextResponse].weight - text).abs() < 1e-12);
    assert!((edge.by_kind[&InteractionKind::EmojiReaction].weight - emoji).abs() < 1e-12);
    assert!(
        (decay_weight(1.5, 5.0, DEFAULT_HALF_LIFE_SECS) - emoji).abs() < 1e-15,
        "decay_weight disagrees with the closed form"
    );
}

#[test]
fn dangling_quote_does_not_fail_the_run() {
    let mut quoting = msg(2, 2_000, 2);
    quoting.quote_id = Some(123);
    let tables = SignalTables {
        messages: vec![msg(1, 1_000, 1), quoting],
        ..Default::default()
    };

    let output = pipeline::run(&tables, &PipelineOptions::new(2)).unwrap();
    assert_eq!(output.diagnostics.quotes_unmatched, 1);
    assert_eq!(output.edges.len(), 1);
    assert!(output.edges.get(2, 1).is_some());
}

#[test]
fn disconnected_graph_reports_ranking_failure() {
    // A single voice produces no edges at all
    let tables = SignalTables {
        messages: vec![msg(1, 1_000, 1), msg(2, 2_000, 1)],
        ..Default::default()
    };

    let output = pipeline::run(&tables, &PipelineOptions::new(2)).unwrap();
    assert!(output.is_empty());
    assert_eq!(output.influence().unwrap_err(), PipelineError::EmptyGraph);
    assert!(output.outward(1).is_empty());
}

#[test]
fn remap_merges_retired_ids_before_extraction() {
    let tables = SignalTables {
        messages: vec![msg(1, 1_000, 1), msg(2, 2_000, 9), msg(3, 3_000, 1)],
        remaps: vec![RecipientRemap { old_id: 9, new_id: 4 }],
        ..Default::default()
    };

    let output = pipeline::run(&tables, &PipelineOptions::new(2)).unwrap();
    let keys: Vec<(i64, i64)> = output
        .edges
        .edges()
        .iter()
        .map(|e| (e.source, e.target))
        .collect();
    assert_eq!(keys, vec![(1, 4), (4, 1)]);
}

#[test]
fn retired_id_ranks_like_its_replacement() {
    let conn = seeded_connection(7, 120);
    let output =
        pipeline::run_from_database(&conn, &PipelineOptions::new(mock::MOCK_GROUP_THREAD)).unwrap();

    let current = output.outward(4);
    assert!(!current.is_empty());
    assert_eq!(output.outward(mock::MOCK_REMAPPED_OLD_ID), current);
    assert_eq!(output.resolve(mock::MOCK_REMAPPED_OLD_ID), 4);
    assert_eq!(output.label(mock::MOCK_REMAPPED_OLD_ID), output.label(4));
}

#[test]
fn zero_default_half_life_is_rejected_not_nan() {
    // Two messages at t=0: the elapsed median is 0, so the default is needed
    let tables = SignalTables {
        messages: vec![msg(1, 0, 1), msg(2, 0, 2)],
        ..Default::default()
    };

    for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let mut options = PipelineOptions::new(2);
        options.default_half_life_secs = bad;
        let err = pipeline::run(&tables, &options).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, PipelineError::InvalidHalfLife { .. }));
    }

    let conn = seeded_connection(3, 20);
    let mut options = PipelineOptions::new(mock::MOCK_GROUP_THREAD);
    options.default_half_life_secs = 0.0;
    let err = pipeline::run_from_database(&conn, &options).unwrap_err();
    assert_eq!(
        err.downcast_ref::<PipelineError>(),
        Some(&PipelineError::InvalidHalfLife { seconds: 0.0 })
    );
}

#[test]
fn kind_option_ranks_one_category() {
    let conn = seeded_connection(7, 120);
    let full =
        pipeline::run_from_database(&conn, &PipelineOptions::new(mock::MOCK_GROUP_THREAD)).unwrap();

    let emoji = InteractionKind::parse("emoji").unwrap();
    let options = PipelineOptions::new(mock::MOCK_GROUP_THREAD).with_kind(Some(emoji));
    let only = pipeline::run_from_database(&conn, &options).unwrap();

    assert!(!only.is_empty());
    assert_eq!(only.kind, Some(emoji));
    assert_eq!(only.edges, full.edges.filter_kind(emoji));
    assert!(only.weighted.iter().all(|w| w.interaction.kind == emoji));
    assert!(only
        .edges
        .edges()
        .iter()
        .all(|e| e.by_kind.keys().all(|k| *k == emoji)));

    // Decay tempo is shared with the unfiltered run
    assert_eq!(only.half_lives, full.half_lives);
    if let Ok(rows) = only.influence() {
        assert_eq!(rows.len(), only.edges.nodes().len());
    }
}

#[test]
fn empty_window_is_no_data_not_an_error() {
    let conn = seeded_connection(3, 40);
    let options = PipelineOptions::new(mock::MOCK_GROUP_THREAD)
        .with_window(TimeWindow::new(Some(0), Some(1_000)).unwrap());
    let output = pipeline::run_from_database(&conn, &options).unwrap();

    assert!(output.is_empty());
    assert!(output.diagnostics.outside_window > 0);
}

#[test]
fn window_narrows_the_network() {
    let conn = seeded_connection(3, 100);
    let full =
        pipeline::run_from_database(&conn, &PipelineOptions::new(mock::MOCK_GROUP_THREAD)).unwrap();

    let first_day = TimeWindow::new(Some(1_700_000_000_000), Some(1_700_000_000_000 + 3_600_000))
        .unwrap();
    let narrowed = pipeline::run_from_database(
        &conn,
        &PipelineOptions::new(mock::MOCK_GROUP_THREAD).with_window(first_day),
    )
    .unwrap();

    assert!(narrowed.weighted.len() < full.weighted.len());
    assert!(narrowed
        .weighted
        .iter()
        .all(|w| first_day.contains(w.interaction.target_ts)));
}

#[test]
fn unknown_thread_is_empty() {
    let conn = seeded_connection(3, 20);
    let output = pipeline::run_from_database(&conn, &PipelineOptions::new(9_999)).unwrap();
    assert!(output.is_empty());
    assert_eq!(output.diagnostics.messages_in_thread, 0);
}

// ============================================================
// Schema violations are fatal
// ============================================================

#[test]
fn missing_column_aborts_before_any_output() {
    let conn = Connection::open_in_memory().unwrap();
    mock::create_schema(&conn).unwrap();
    conn.execute_batch(
        "DROP TABLE message;
         CREATE TABLE message (_id INTEGER PRIMARY KEY, date_sent INTEGER, thread_id INTEGER, body TEXT);",
    )
    .unwrap();

    let err = pipeline::run_from_database(&conn, &PipelineOptions::new(2)).unwrap_err();
    let typed = err.downcast_ref::<PipelineError>().unwrap();
    assert!(typed.is_fatal());
    assert_eq!(
        *typed,
        PipelineError::SchemaViolation {
            table: "message".to_string(),
            missing: vec![
                "date_received".to_string(),
                "from_recipient_id".to_string(),
                "quote_id".to_string(),
                "to_recipient_id".to_string(),
            ],
        }
    );
}

#[test]
fn missing_table_aborts() {
    let conn = Connection::open_in_memory().unwrap();
    mock::create_schema(&conn).unwrap();
    conn.execute_batch("DROP TABLE reaction;").unwrap();

    let err = queries::load_tables(&conn).unwrap_err();
    assert_eq!(
        err.downcast_ref::<PipelineError>(),
        Some(&PipelineError::MissingTable {
            table: "reaction".to_string()
        })
    );
}

// ============================================================
// Export: identical input gives a byte-identical file
// ============================================================

#[test]
fn edge_export_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("signal.db");
    mock::write_database(&db_path, 21, 90).unwrap();

    let mut files = Vec::new();
    for run in 0..2 {
        let conn = signal::open(&db_path).unwrap();
        let output =
            pipeline::run_from_database(&conn, &PipelineOptions::new(mock::MOCK_GROUP_THREAD))
                .unwrap();
        let out_dir = dir.path().join(format!("run{run}"));
        let path = csv::output_path(&out_dir, csv::EDGES_FILE).unwrap();
        csv::write_edges(&path, &output.edges).unwrap();
        files.push(fs::read(&path).unwrap());
    }

    assert_eq!(files[0], files[1]);
    let text = String::from_utf8(files[0].clone()).unwrap();
    assert!(text.starts_with("source_id,target_id,weight\n"));
    assert!(text.lines().count() > 1);
}

#[test]
fn same_seed_gives_same_database_contents() {
    let a = queries::load_tables(&seeded_connection(5, 50)).unwrap();
    let b = queries::load_tables(&seeded_connection(5, 50)).unwrap();
    let c = queries::load_tables(&seeded_connection(6, 50)).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn ranking_exports_carry_headers() {
    let dir = tempfile::tempdir().unwrap();
    let conn = seeded_connection(7, 120);
    let output =
        pipeline::run_from_database(&conn, &PipelineOptions::new(mock::MOCK_GROUP_THREAD)).unwrap();

    let influence_path = dir.path().join(csv::INFLUENCE_FILE);
    csv::write_influence(&influence_path, &output.influence().unwrap()).unwrap();
    let influence = fs::read_to_string(&influence_path).unwrap();
    assert!(influence.starts_with("participant_id,rank,score\n"));

    let outward_path = dir.path().join(csv::OUTWARD_FILE);
    csv::write_outward(&outward_path, &output.outward_all()).unwrap();
    let outward = fs::read_to_string(&outward_path).unwrap();
    assert!(outward.starts_with("source_id,target_id,rank,score\n"));
    assert_eq!(outward.lines().count() - 1, output.edges.len());

    let json_path = csv::output_path(dir.path(), csv::INFLUENCE_JSON_FILE).unwrap();
    csv::write_json(&json_path, &output.influence().unwrap()).unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(parsed[0]["rank"], 1);

    let outward_json = dir.path().join(csv::OUTWARD_JSON_FILE);
    csv::write_json(&outward_json, &output.outward_all()).unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&outward_json).unwrap()).unwrap();
    assert_eq!(parsed["4"][0]["source_id"], 4);
}
