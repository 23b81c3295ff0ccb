use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};

use crate::graph::decay::{self, DEFAULT_HALF_LIFE_SECS};
use crate::graph::interactions::ReactionPolicy;

/// Which copy of the chat history to analyse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Synthetic dataset written by `amongfriends seed-mock` (default)
    Mocked,
    /// A decrypted Signal backup database
    Production,
}

impl DataSource {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mocked" | "mock" => Ok(DataSource::Mocked),
            "production" | "prod" => Ok(DataSource::Production),
            other => anyhow::bail!(
                "Unknown data source '{other}'. Expected 'mocked' or 'production'."
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Mocked => "mocked",
            DataSource::Production => "production",
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded by the binary via dotenvy before this runs.
/// CLI flags override individual fields after loading.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_source: DataSource,
    /// Path of the mocked Signal-shaped database
    pub mock_db_path: PathBuf,
    /// Path of the production Signal database
    pub signal_db_path: PathBuf,
    /// Thread (group conversation) to analyse
    pub thread_id: i64,
    /// Directory for nodes_edges.csv and ranking exports
    pub output_dir: PathBuf,
    /// Half-life used when a kind has too few samples to estimate one
    pub default_half_life_secs: f64,
    pub reaction_policy: ReactionPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Unset variables fall back to defaults; set-but-unparseable values are
    /// an error rather than a silent default.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_source = match lookup("AMONGFRIENDS_DATA_SOURCE") {
            Some(v) => DataSource::parse(&v)?,
            None => DataSource::Mocked,
        };

        let thread_id = match lookup("AMONGFRIENDS_THREAD_ID") {
            Some(v) => v
                .trim()
                .parse::<i64>()
                .with_context(|| format!("AMONGFRIENDS_THREAD_ID must be an integer, got '{v}'"))?,
            None => 2,
        };

        let default_half_life_secs = match lookup("AMONGFRIENDS_DEFAULT_HALF_LIFE_SECS") {
            Some(v) => {
                let secs = v.trim().parse::<f64>().with_context(|| {
                    format!("AMONGFRIENDS_DEFAULT_HALF_LIFE_SECS must be a number, got '{v}'")
                })?;
                decay::check_half_life(secs).context("AMONGFRIENDS_DEFAULT_HALF_LIFE_SECS")?
            }
            None => DEFAULT_HALF_LIFE_SECS,
        };

        let reaction_policy = match lookup("AMONGFRIENDS_REACTION_POLICY") {
            Some(v) => ReactionPolicy::parse(&v)?,
            None => ReactionPolicy::Every,
        };

        Ok(Self {
            data_source,
            mock_db_path: lookup("AMONGFRIENDS_MOCK_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/mock/signal.db")),
            signal_db_path: lookup("AMONGFRIENDS_SIGNAL_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/signal.db")),
            thread_id,
            output_dir: lookup("AMONGFRIENDS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./output")),
            default_half_life_secs,
            reaction_policy,
        })
    }

    /// The database path selected by `data_source`.
    pub fn db_path(&self) -> &Path {
        match self.data_source {
            DataSource::Mocked => &self.mock_db_path,
            DataSource::Production => &self.signal_db_path,
        }
    }

    /// Check that the selected database exists.
    /// Call this before any operation that reads chat history.
    pub fn require_database(&self) -> Result<()> {
        let path = self.db_path();
        if !path.exists() {
            match self.data_source {
                DataSource::Mocked => anyhow::bail!(
                    "Mock database not found at {}.\n\
                     Run `amongfriends seed-mock` to create it.",
                    path.display()
                ),
                DataSource::Production => anyhow::bail!(
                    "Signal database not found at {}.\n\
                     Set AMONGFRIENDS_SIGNAL_DB_PATH to your decrypted backup,\n\
                     or set AMONGFRIENDS_DATA_SOURCE=mocked.",
                    path.display()
                ),
            }
        }
        Ok(())
    }
}

/// Parse a `--start`/`--end` value into epoch milliseconds.
///
/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD` date, which is
/// taken as midnight UTC.
pub fn parse_instant(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").with_context(|| {
        format!("Expected an RFC 3339 timestamp or YYYY-MM-DD date, got '{value}'")
    })?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("No midnight on {date}"))?;
    Ok(midnight.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = Config::from_vars(lookup(&[])).unwrap();
        assert_eq!(config.data_source, DataSource::Mocked);
        assert_eq!(config.thread_id, 2);
        assert_eq!(config.default_half_life_secs, DEFAULT_HALF_LIFE_SECS);
        assert_eq!(config.reaction_policy, ReactionPolicy::Every);
        assert_eq!(config.db_path(), Path::new("./data/mock/signal.db"));
    }

    #[test]
    fn production_selects_signal_path() {
        let config = Config::from_vars(lookup(&[
            ("AMONGFRIENDS_DATA_SOURCE", "production"),
            ("AMONGFRIENDS_SIGNAL_DB_PATH", "/backups/signal.db"),
        ]))
        .unwrap();
        assert_eq!(config.db_path(), Path::new("/backups/signal.db"));
    }

    #[test]
    fn bad_thread_id_is_an_error() {
        assert!(Config::from_vars(lookup(&[("AMONGFRIENDS_THREAD_ID", "two")])).is_err());
    }

    #[test]
    fn non_positive_half_life_is_an_error() {
        assert!(
            Config::from_vars(lookup(&[("AMONGFRIENDS_DEFAULT_HALF_LIFE_SECS", "0")])).is_err()
        );
        assert!(
            Config::from_vars(lookup(&[("AMONGFRIENDS_DEFAULT_HALF_LIFE_SECS", "NaN")])).is_err()
        );
    }

    #[test]
    fn unknown_data_source_is_an_error() {
        assert!(DataSource::parse("staging").is_err());
        assert_eq!(DataSource::parse(" Production ").unwrap(), DataSource::Production);
    }

    #[test]
    fn instants_accept_dates_and_timestamps() {
        assert_eq!(parse_instant("1970-01-02").unwrap(), 86_400_000);
        assert_eq!(parse_instant("1970-01-01T00:00:01Z").unwrap(), 1_000);
        assert_eq!(parse_instant("1970-01-01T01:00:00+01:00").unwrap(), 0);
        assert!(parse_instant("yesterday").is_err());
    }
}
