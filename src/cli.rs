//! Command-line interface argument parsing for btreadmill.
//!
//! - `btreadmill dashboard --simulator`
//! - `btreadmill history`
//! - `btreadmill merge 2026-08-29`
//! - `btreadmill export 12 -o walk.gpx`
//! - `btreadmill upload 12`

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::settings::resolve_data_dir;

/// A terminal companion for the RZ_TreadMill walking pad.
///
/// Controls the belt, runs structured workout plans, and keeps a local
/// history of your walks.
#[derive(Parser, Debug)]
#[command(name = "btreadmill")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Data directory holding the database, settings and plans.
    /// Defaults to $BTREADMILL_DIR, then the platform data dir.
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive dashboard
    Dashboard {
        /// Drive a simulated belt instead of real hardware
        #[arg(short, long)]
        simulator: bool,

        /// Simulated-time multiplier for demos (simulator only)
        #[arg(long, default_value = "1")]
        time_factor: f64,
    },

    /// Print the run history grouped by day
    History,

    /// Merge all completed runs of one day into a single record
    Merge {
        /// Day to merge, as YYYY-MM-DD
        date: NaiveDate,
    },

    /// Delete a run from the history
    Delete {
        /// Run id, as shown by `history`
        run_id: i64,
    },

    /// Export a run as a GPX file
    Export {
        /// Run id, as shown by `history`
        run_id: i64,

        /// Output path; defaults to run-<id>.gpx
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a run to Strava
    Upload {
        /// Run id, as shown by `history`
        run_id: i64,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

/// Configuration for the dashboard, derived from CLI arguments
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub simulator: bool,
    pub time_factor: f64,
}

impl AppConfig {
    pub fn from_dashboard_command(
        data_dir: Option<&str>,
        simulator: bool,
        time_factor: f64,
    ) -> Self {
        AppConfig {
            data_dir: resolve_data_dir(data_dir),
            simulator,
            time_factor: if time_factor > 0.0 { time_factor } else { 1.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_config_defaults() {
        let config = AppConfig::from_dashboard_command(Some("/tmp/bt-test"), true, 1.0);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/bt-test"));
        assert!(config.simulator);
        assert!((config.time_factor - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_factor_floor() {
        let config = AppConfig::from_dashboard_command(Some("/tmp/bt-test"), true, 0.0);
        assert!((config.time_factor - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["btreadmill", "dashboard", "--simulator"]);
        assert!(matches!(
            cli.command,
            Commands::Dashboard {
                simulator: true,
                ..
            }
        ));

        let cli = Cli::parse_from(["btreadmill", "merge", "2026-08-29"]);
        match cli.command {
            Commands::Merge { date } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 8, 29).unwrap());
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::parse_from(["btreadmill", "export", "7", "-o", "walk.gpx"]);
        match cli.command {
            Commands::Export { run_id, output } => {
                assert_eq!(run_id, 7);
                assert_eq!(output, Some(PathBuf::from("walk.gpx")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
