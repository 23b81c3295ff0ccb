use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use amongfriends::config::{self, Config, DataSource};
use amongfriends::error::PipelineError;
use amongfriends::graph::interactions::{InteractionKind, TimeWindow};
use amongfriends::output::{csv, terminal};
use amongfriends::pipeline::{self, PipelineOptions, PipelineOutput};
use amongfriends::signal::{self, mock};

/// AmongFriends: who responds to whom in a group chat.
///
/// Builds a weighted interaction network from a Signal group thread and
/// ranks participants by how much the group responds to them.
#[derive(Parser)]
#[command(name = "amongfriends", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Which thread and time window to analyse. Overrides the environment.
#[derive(Args, Clone, Debug)]
struct WindowArgs {
    /// Thread id to analyse
    #[arg(long)]
    thread: Option<i64>,

    /// Window start, inclusive (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,

    /// Window end, exclusive (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    end: Option<String>,

    /// Data source: mocked or production
    #[arg(long)]
    source: Option<String>,

    /// Only one interaction category: response, quotation or emoji
    #[arg(long)]
    kind: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the mocked Signal dataset
    SeedMock {
        /// RNG seed; the same seed always produces the same database
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of random group messages (default: 200)
        #[arg(long, default_value = "200")]
        messages: usize,
    },

    /// Build the interaction network and write nodes_edges.csv
    Build {
        #[command(flatten)]
        window: WindowArgs,

        /// Number of heaviest edges to print (default: 20)
        #[arg(long, default_value = "20")]
        top: usize,
    },

    /// Rank participants by influence (eigenvector centrality)
    Influence {
        #[command(flatten)]
        window: WindowArgs,

        /// Also export the ranking as influence_ranking.json
        #[arg(long)]
        json: bool,
    },

    /// Rank who a participant responds to most
    Outward {
        #[command(flatten)]
        window: WindowArgs,

        /// Participant (recipient id) to rank targets for
        #[arg(long, required_unless_present = "all", conflicts_with = "all")]
        participant: Option<i64>,

        /// Rank targets for every participant
        #[arg(long)]
        all: bool,

        /// Also export the ranking as outward_ranking.json
        #[arg(long)]
        json: bool,
    },

    /// Show data source, database presence and table row counts
    Status {
        /// Data source: mocked or production
        #[arg(long)]
        source: Option<String>,
    },
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Logs go to stderr, leaving stdout to the tables
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("amongfriends=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::SeedMock { seed, messages } => {
            let config = Config::load()?;
            let path = &config.mock_db_path;
            info!(seed, messages, path = %path.display(), "Seeding mock database");
            let summary = mock::write_database(path, seed, messages)?;
            println!("Mock database written to: {}", path.display());
            println!(
                "  {} messages, {} reactions, {} mentions",
                summary.messages, summary.reactions, summary.mentions
            );
            println!(
                "  Group thread: {}  (run `amongfriends build --thread {}`)",
                mock::MOCK_GROUP_THREAD,
                mock::MOCK_GROUP_THREAD
            );
        }

        Commands::Build { window, top } => {
            let (config, output) = prepare(&window)?;
            terminal::display_edges(&output, top);
            terminal::display_diagnostics(&output);

            let path = csv::output_path(&config.output_dir, csv::EDGES_FILE)?;
            csv::write_edges(&path, &output.edges)?;
            println!("\nEdge table written to: {}", path.display());
        }

        Commands::Influence { window, json } => {
            let (config, output) = prepare(&window)?;
            if output.is_empty() {
                println!("No data for this thread/window.");
                return Ok(());
            }

            let rows = match output.influence() {
                Ok(rows) => rows,
                Err(PipelineError::EmptyGraph) => {
                    println!("No data for this thread/window.");
                    return Ok(());
                }
                Err(e) => {
                    println!("{} {}", "Influence ranking unavailable:".red(), e);
                    println!("The edge table is still valid; run `amongfriends build` to export it.");
                    return Err(e.into());
                }
            };

            let path = csv::output_path(&config.output_dir, csv::INFLUENCE_FILE)?;
            csv::write_influence(&path, &rows)?;

            terminal::display_influence(&output, &rows);
            println!("\nRanking written to: {}", path.display());

            if json {
                let json_path = csv::output_path(&config.output_dir, csv::INFLUENCE_JSON_FILE)?;
                csv::write_json(&json_path, &rows)?;
                println!("JSON written to: {}", json_path.display());
            }
        }

        Commands::Outward {
            window,
            participant,
            all,
            json,
        } => {
            let (config, output) = prepare(&window)?;
            if output.is_empty() {
                println!("No data for this thread/window.");
                return Ok(());
            }

            let rankings = if all {
                output.outward_all()
            } else {
                let mut one = BTreeMap::new();
                if let Some(id) = participant {
                    one.insert(output.resolve(id), output.outward(id));
                }
                one
            };

            let path = csv::output_path(&config.output_dir, csv::OUTWARD_FILE)?;
            csv::write_outward(&path, &rankings)?;

            for (source, rows) in &rankings {
                terminal::display_outward(&output, *source, rows);
            }
            println!("\nRanking written to: {}", path.display());

            if json {
                let json_path = csv::output_path(&config.output_dir, csv::OUTWARD_JSON_FILE)?;
                csv::write_json(&json_path, &rankings)?;
                println!("JSON written to: {}", json_path.display());
            }
        }

        Commands::Status { source } => {
            let mut config = Config::load()?;
            if let Some(source) = source {
                config.data_source = DataSource::parse(&source)?;
            }
            amongfriends::status::show(&config)?;
        }
    }

    Ok(())
}

/// Load config, apply CLI overrides, and run the pipeline for one window.
fn prepare(args: &WindowArgs) -> Result<(Config, PipelineOutput)> {
    let mut config = Config::load()?;
    if let Some(source) = &args.source {
        config.data_source = DataSource::parse(source)?;
    }
    if let Some(thread) = args.thread {
        config.thread_id = thread;
    }

    let start = args.start.as_deref().map(config::parse_instant).transpose()?;
    let end = args.end.as_deref().map(config::parse_instant).transpose()?;
    let window = TimeWindow::new(start, end)?;
    let kind = args.kind.as_deref().map(InteractionKind::parse).transpose()?;

    config.require_database()?;
    let db_path: PathBuf = config.db_path().to_path_buf();
    let conn = signal::open(&db_path)?;

    let options = PipelineOptions::from_config(&config, window).with_kind(kind);
    let output = pipeline::run_from_database(&conn, &options)?;
    Ok((config, output))
}
