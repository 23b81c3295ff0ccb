// System status display: data source, database presence, table row counts.

use anyhow::Result;

use crate::config::Config;
use crate::signal::{self, queries, schema};

/// Display system status to the terminal.
pub fn show(config: &Config) -> Result<()> {
    let db_path = config.db_path();
    println!("Data source: {}", config.data_source);
    println!("Thread: {}", config.thread_id);
    println!("Output directory: {}", config.output_dir.display());

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("\nRun `amongfriends seed-mock` to generate the mocked dataset.");
        return Ok(());
    }

    let file_size = std::fs::metadata(db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_path.display(), file_size);

    let conn = signal::open(db_path)?;
    println!("Tables:");
    for (table, count) in queries::table_counts(&conn)? {
        match count {
            Some(n) => println!("  {:<22} {:>8} rows", table, n),
            None => println!("  {:<22} {:>8}", table, "missing"),
        }
    }

    match schema::validate_schema(&conn) {
        Ok(()) => println!("Schema: ok"),
        Err(e) => println!("Schema: {e}"),
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
