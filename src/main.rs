//! btreadmill: a terminal companion for the RZ_TreadMill walking pad.
//!
//! Controls the belt, executes structured workout plans, records runs in a
//! local SQLite database, and exports or uploads them to Strava.

mod app;
mod cli;
mod data;
mod export;
mod gps;
mod protocol;
mod settings;
mod strava;
mod treadmill;
mod ui;
mod workout;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use cli::{AppConfig, Cli, Commands};
use data::Storage;
use gps::TrackGenerator;
use settings::{resolve_data_dir, Settings};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let data_dir = resolve_data_dir(cli.data_dir.as_deref());

    match cli.command {
        Commands::Dashboard {
            simulator,
            time_factor,
        } => {
            // The TUI owns the terminal; logs go to a file instead.
            init_file_logging(&data_dir)?;
            let config =
                AppConfig::from_dashboard_command(cli.data_dir.as_deref(), simulator, time_factor);
            app::run(config)
        }
        Commands::History => {
            init_stderr_logging();
            print_history(&data_dir)
        }
        Commands::Merge { date } => {
            init_stderr_logging();
            merge_day(&data_dir, date)
        }
        Commands::Delete { run_id } => {
            init_stderr_logging();
            delete_run(&data_dir, run_id)
        }
        Commands::Export { run_id, output } => {
            init_stderr_logging();
            export_run(&data_dir, run_id, output)
        }
        Commands::Upload { run_id } => {
            init_stderr_logging();
            upload_run(&data_dir, run_id)
        }
    }
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_writer(std::io::stderr)
        .init();
}

fn init_file_logging(data_dir: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {data_dir:?}"))?;
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join("btreadmill.log"))
        .context("Failed to open log file")?;
    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_writer(std::sync::Arc::new(log))
        .with_ansi(false)
        .init();
    Ok(())
}

fn print_history(data_dir: &std::path::Path) -> Result<()> {
    let storage = Storage::open(data_dir)?;
    let groups = storage.runs_grouped_by_day()?;
    if groups.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }
    for group in groups {
        println!("{}", group.title());
        for run in &group.runs {
            let id = run.id.map(|i| i.to_string()).unwrap_or_default();
            let time = run
                .start_timestamp
                .with_timezone(&chrono::Local)
                .format("%H:%M");
            let uploaded = if run.uploaded_id.is_some() {
                "  [uploaded]"
            } else {
                ""
            };
            println!(
                "  #{id}  {time}  {:.2} km  {}  {}  top {:.1} km/h{uploaded}",
                run.total_km(),
                run.duration_string(),
                run.pace_string(),
                run.max_speed(),
            );
        }
    }
    Ok(())
}

fn merge_day(data_dir: &std::path::Path, date: chrono::NaiveDate) -> Result<()> {
    let mut storage = Storage::open(data_dir)?;
    match storage.merge_day(date)? {
        Some(run) => {
            println!(
                "Merged {date} into run #{}: {:.2} km, {}",
                run.id.unwrap_or_default(),
                run.total_km(),
                run.duration_string()
            );
        }
        None => println!("Nothing to merge on {date}: fewer than two completed runs."),
    }
    Ok(())
}

fn delete_run(data_dir: &std::path::Path, run_id: i64) -> Result<()> {
    let storage = Storage::open(data_dir)?;
    let run = storage
        .fetch_run(run_id)?
        .with_context(|| format!("no run with id {run_id}"))?;
    storage.delete_run(run_id)?;
    println!(
        "Deleted run #{run_id} ({:.2} km on {})",
        run.total_km(),
        run.day()
    );
    Ok(())
}

fn export_run(data_dir: &std::path::Path, run_id: i64, output: Option<PathBuf>) -> Result<()> {
    let storage = Storage::open(data_dir)?;
    let run = storage
        .fetch_run(run_id)?
        .with_context(|| format!("no run with id {run_id}"))?;

    let settings = Settings::load(data_dir)?;
    let track = TrackGenerator::new(
        settings.gps.start,
        settings.gps.pattern,
        settings.gps.track_scale,
    );

    let path = output.unwrap_or_else(|| PathBuf::from(format!("run-{run_id}.gpx")));
    export::export_run(&run, &track, &path)?;
    println!(
        "Exported run #{run_id} to {} ({} track)",
        path.display(),
        settings.gps.pattern.display_name()
    );
    Ok(())
}

fn upload_run(data_dir: &std::path::Path, run_id: i64) -> Result<()> {
    let storage = Storage::open(data_dir)?;
    let run = storage
        .fetch_run(run_id)?
        .with_context(|| format!("no run with id {run_id}"))?;
    if let Some(existing) = &run.uploaded_id {
        bail!("run #{run_id} was already uploaded as activity {existing}");
    }

    let settings = Settings::load(data_dir)?;
    let Some(token) = settings.strava_access_token.clone() else {
        bail!("no Strava access token configured; set strava_access_token in the settings file");
    };

    let track = TrackGenerator::new(
        settings.gps.start,
        settings.gps.pattern,
        settings.gps.track_scale,
    );
    let gpx = export::run_to_gpx(&run, &track)?;

    let client = strava::StravaClient::new(token)?;
    let activity_id = client.upload_run(&run, gpx)?;
    storage.set_uploaded_id(run_id, &activity_id)?;
    println!("Uploaded run #{run_id} as Strava activity {activity_id}");
    Ok(())
}
