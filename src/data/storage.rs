//! SQLite storage layer for run history.
//!
//! Schema (`runs` table):
//! - id, start_timestamp, end_timestamp
//! - distance_meters, distance_meters_offset
//! - speeds (pipe-separated km/h samples)
//! - completed, uploaded_id, paused

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};

use super::models::{DayGroup, Run};

const DB_FILE_NAME: &str = "runs.sqlite";

/// Ordered schema migrations; entry N is version N+1. Applied versions are
/// recorded in `schema_migrations`, so append-only.
const MIGRATIONS: &[&str] = &["
CREATE TABLE runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_timestamp TEXT NOT NULL,
    end_timestamp TEXT,
    distance_meters REAL NOT NULL DEFAULT 0,
    distance_meters_offset REAL NOT NULL DEFAULT 0,
    speeds TEXT NOT NULL DEFAULT '',
    completed INTEGER NOT NULL DEFAULT 0,
    uploaded_id TEXT,
    paused INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX idx_runs_start ON runs(start_timestamp);
"];

/// Bring the database up to the latest schema version.
fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )
    .context("Failed to create migration table")?;

    let applied: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let version = idx as i64 + 1;
        if version <= applied {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(sql)
            .with_context(|| format!("Failed to apply migration {version}"))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, format_timestamp(&Utc::now())],
        )?;
        tx.commit()
            .with_context(|| format!("Failed to commit migration {version}"))?;
        tracing::debug!(version, "applied database migration");
    }
    Ok(())
}

/// Parse a timestamp column written by `format_timestamp`
fn parse_timestamp(timestamp: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339()
}

fn row_to_run(row: &Row) -> rusqlite::Result<Run> {
    let start: String = row.get(1)?;
    let end: Option<String> = row.get(2)?;
    Ok(Run {
        id: Some(row.get(0)?),
        start_timestamp: parse_timestamp(&start)?,
        end_timestamp: end.as_deref().map(parse_timestamp).transpose()?,
        distance_meters: row.get(3)?,
        distance_meters_offset: row.get(4)?,
        speeds: row.get(5)?,
        completed: row.get(6)?,
        uploaded_id: row.get(7)?,
        paused: row.get(8)?,
    })
}

const RUN_COLUMNS: &str = "id, start_timestamp, end_timestamp, distance_meters, \
     distance_meters_offset, speeds, completed, uploaded_id, paused";

/// Storage interface for the run database
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (creating if needed) the database under the data directory.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {data_dir:?}"))?;
        let path = data_dir.join(DB_FILE_NAME);
        Self::open_path(&path)
    }

    fn open_path(path: &PathBuf) -> Result<Self> {
        let mut conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {path:?}"))?;
        migrate(&mut conn)?;
        Ok(Storage { conn })
    }

    /// In-memory database, used by tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        Ok(Storage { conn })
    }

    /// Insert or update a run. Assigns `run.id` on first save.
    pub fn save_run(&self, run: &mut Run) -> Result<()> {
        match run.id {
            Some(id) => {
                self.conn
                    .execute(
                        "UPDATE runs SET start_timestamp = ?1, end_timestamp = ?2, \
                         distance_meters = ?3, distance_meters_offset = ?4, speeds = ?5, \
                         completed = ?6, uploaded_id = ?7, paused = ?8 WHERE id = ?9",
                        params![
                            format_timestamp(&run.start_timestamp),
                            run.end_timestamp.as_ref().map(format_timestamp),
                            run.distance_meters,
                            run.distance_meters_offset,
                            run.speeds,
                            run.completed,
                            run.uploaded_id,
                            run.paused,
                            id,
                        ],
                    )
                    .context("Failed to update run")?;
            }
            None => {
                self.conn
                    .execute(
                        "INSERT INTO runs (start_timestamp, end_timestamp, distance_meters, \
                         distance_meters_offset, speeds, completed, uploaded_id, paused) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            format_timestamp(&run.start_timestamp),
                            run.end_timestamp.as_ref().map(format_timestamp),
                            run.distance_meters,
                            run.distance_meters_offset,
                            run.speeds,
                            run.completed,
                            run.uploaded_id,
                            run.paused,
                        ],
                    )
                    .context("Failed to insert run")?;
                run.id = Some(self.conn.last_insert_rowid());
            }
        }
        Ok(())
    }

    pub fn delete_run(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM runs WHERE id = ?1", params![id])
            .with_context(|| format!("Failed to delete run {id}"))?;
        Ok(())
    }

    pub fn fetch_run(&self, id: i64) -> Result<Option<Run>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], row_to_run)?;
        rows.next().transpose().context("Failed to read run")
    }

    /// All runs, newest first.
    pub fn fetch_all_runs(&self) -> Result<Vec<Run>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM runs ORDER BY start_timestamp DESC"
        ))?;
        let runs = stmt
            .query_map([], row_to_run)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read runs")?;
        Ok(runs)
    }

    /// Runs grouped by local calendar day, newest day first.
    pub fn runs_grouped_by_day(&self) -> Result<Vec<DayGroup>> {
        let runs = self.fetch_all_runs()?;
        let mut groups: Vec<DayGroup> = Vec::new();
        for run in runs {
            let day = run.day();
            match groups.last_mut() {
                Some(group) if group.date == day => group.runs.push(run),
                _ => groups.push(DayGroup {
                    date: day,
                    runs: vec![run],
                }),
            }
        }
        Ok(groups)
    }

    /// The most recent run left paused and incomplete, if any.
    pub fn resumable_run(&self) -> Result<Option<Run>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM runs WHERE paused = 1 AND completed = 0 \
             ORDER BY start_timestamp DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map([], row_to_run)?;
        rows.next()
            .transpose()
            .context("Failed to look up resumable run")
    }

    /// Merge all completed runs of one local day into a single record.
    ///
    /// The merged run keeps the earliest start and latest end, sums both
    /// distance columns into `distance_meters`, and concatenates the speed
    /// samples in chronological order. Absorbed rows are deleted in the same
    /// transaction. Returns the surviving run, or None if the day has fewer
    /// than two completed runs.
    pub fn merge_day(&mut self, date: NaiveDate) -> Result<Option<Run>> {
        let mut day_runs: Vec<Run> = self
            .fetch_all_runs()?
            .into_iter()
            .filter(|r| r.completed && r.day() == date)
            .collect();
        if day_runs.len() < 2 {
            return Ok(None);
        }
        // fetch_all_runs is newest first; merge wants chronological order
        day_runs.reverse();

        let mut merged = day_runs[0].clone();
        let mut speeds: Vec<f64> = Vec::new();
        let mut total_meters = 0.0;
        for run in &day_runs {
            total_meters += run.total_meters();
            speeds.extend(run.speeds_array());
            if let Some(end) = run.end_timestamp {
                if merged.end_timestamp.map(|e| end > e).unwrap_or(true) {
                    merged.end_timestamp = Some(end);
                }
            }
            // Merging discards per-run upload state
            if run.uploaded_id.is_some() {
                merged.uploaded_id = None;
            }
        }
        merged.distance_meters = total_meters;
        merged.distance_meters_offset = 0.0;
        merged.set_speeds(&speeds);
        merged.paused = false;

        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE runs SET end_timestamp = ?1, distance_meters = ?2, \
             distance_meters_offset = 0, speeds = ?3, paused = 0, uploaded_id = NULL \
             WHERE id = ?4",
            params![
                merged.end_timestamp.as_ref().map(format_timestamp),
                merged.distance_meters,
                merged.speeds,
                merged.id,
            ],
        )
        .context("Failed to update merged run")?;
        for run in &day_runs[1..] {
            if let Some(id) = run.id {
                tx.execute("DELETE FROM runs WHERE id = ?1", params![id])
                    .context("Failed to delete absorbed run")?;
            }
        }
        tx.commit().context("Failed to commit merge")?;

        Ok(Some(merged))
    }

    /// Record the Strava activity id after a successful upload.
    pub fn set_uploaded_id(&self, run_id: i64, uploaded_id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE runs SET uploaded_id = ?1 WHERE id = ?2",
                params![uploaded_id, run_id],
            )
            .with_context(|| format!("Failed to mark run {run_id} as uploaded"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn completed_run(start: &str, duration_secs: i64, meters: f64, speeds: &[f64]) -> Run {
        let start: DateTime<Utc> = start.parse().unwrap();
        let mut run = Run::new(start);
        run.end_timestamp = Some(start + TimeDelta::seconds(duration_secs));
        run.distance_meters = meters;
        run.completed = true;
        run.set_speeds(speeds);
        run
    }

    #[test]
    fn test_save_assigns_id_and_round_trips() {
        let storage = Storage::open_in_memory().unwrap();
        let mut run = completed_run("2026-08-29T08:00:00Z", 600, 1000.0, &[3.0, 3.5]);
        storage.save_run(&mut run).unwrap();
        let id = run.id.expect("id assigned on insert");

        let loaded = storage.fetch_run(id).unwrap().unwrap();
        assert_eq!(loaded.start_timestamp, run.start_timestamp);
        assert_eq!(loaded.end_timestamp, run.end_timestamp);
        assert!((loaded.distance_meters - 1000.0).abs() < 1e-9);
        assert_eq!(loaded.speeds, "3.0|3.5");
        assert!(loaded.completed);
        assert!(!loaded.paused);
    }

    #[test]
    fn test_update_existing_run() {
        let storage = Storage::open_in_memory().unwrap();
        let mut run = completed_run("2026-08-29T08:00:00Z", 600, 1000.0, &[3.0]);
        storage.save_run(&mut run).unwrap();

        run.distance_meters = 1500.0;
        run.paused = true;
        storage.save_run(&mut run).unwrap();

        let loaded = storage.fetch_run(run.id.unwrap()).unwrap().unwrap();
        assert!((loaded.distance_meters - 1500.0).abs() < 1e-9);
        assert!(loaded.paused);
        assert_eq!(storage.fetch_all_runs().unwrap().len(), 1);
    }

    #[test]
    fn test_fetch_all_newest_first() {
        let storage = Storage::open_in_memory().unwrap();
        let mut older = completed_run("2026-08-28T08:00:00Z", 600, 500.0, &[3.0]);
        let mut newer = completed_run("2026-08-29T08:00:00Z", 600, 800.0, &[3.5]);
        storage.save_run(&mut older).unwrap();
        storage.save_run(&mut newer).unwrap();

        let runs = storage.fetch_all_runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, newer.id);
        assert_eq!(runs[1].id, older.id);
    }

    #[test]
    fn test_grouped_by_day() {
        let storage = Storage::open_in_memory().unwrap();
        let mut a = completed_run("2026-08-29T08:00:00Z", 600, 500.0, &[3.0]);
        let mut b = completed_run("2026-08-29T18:00:00Z", 600, 500.0, &[3.0]);
        let mut c = completed_run("2026-08-28T08:00:00Z", 600, 700.0, &[3.0]);
        storage.save_run(&mut a).unwrap();
        storage.save_run(&mut b).unwrap();
        storage.save_run(&mut c).unwrap();

        let groups = storage.runs_grouped_by_day().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].runs.len(), 2);
        assert_eq!(groups[1].runs.len(), 1);
        assert!(groups[0].date > groups[1].date);
    }

    #[test]
    fn test_resumable_run() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(storage.resumable_run().unwrap().is_none());

        let mut done = completed_run("2026-08-29T08:00:00Z", 600, 500.0, &[3.0]);
        storage.save_run(&mut done).unwrap();

        let mut paused = Run::new("2026-08-29T10:00:00Z".parse().unwrap());
        paused.distance_meters = 300.0;
        paused.paused = true;
        storage.save_run(&mut paused).unwrap();

        let found = storage.resumable_run().unwrap().unwrap();
        assert_eq!(found.id, paused.id);
    }

    #[test]
    fn test_merge_day() {
        let mut storage = Storage::open_in_memory().unwrap();
        let mut first = completed_run("2026-08-29T08:00:00Z", 600, 1000.0, &[3.0, 3.5]);
        first.distance_meters_offset = 200.0;
        let mut second = completed_run("2026-08-29T18:00:00Z", 900, 800.0, &[4.0]);
        let mut other_day = completed_run("2026-08-28T08:00:00Z", 600, 500.0, &[3.0]);
        storage.save_run(&mut first).unwrap();
        storage.save_run(&mut second).unwrap();
        storage.save_run(&mut other_day).unwrap();

        let date = first.day();
        let merged = storage.merge_day(date).unwrap().unwrap();
        assert_eq!(merged.id, first.id);
        assert!((merged.total_meters() - 2000.0).abs() < 1e-9);
        assert_eq!(merged.speeds, "3.0|3.5|4.0");
        assert_eq!(merged.end_timestamp, second.end_timestamp);

        let runs = storage.fetch_all_runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.id != second.id));
    }

    #[test]
    fn test_merge_day_needs_two_runs() {
        let mut storage = Storage::open_in_memory().unwrap();
        let mut only = completed_run("2026-08-29T08:00:00Z", 600, 1000.0, &[3.0]);
        storage.save_run(&mut only).unwrap();
        assert!(storage.merge_day(only.day()).unwrap().is_none());
    }

    #[test]
    fn test_migrations_recorded_and_reopen_safe() {
        let dir = tempfile::tempdir().unwrap();
        let run_id;
        {
            let storage = Storage::open(dir.path()).unwrap();
            let version: i64 = storage
                .conn
                .query_row("SELECT MAX(version) FROM schema_migrations", [], |r| {
                    r.get(0)
                })
                .unwrap();
            assert_eq!(version, MIGRATIONS.len() as i64);

            let mut run = completed_run("2026-08-29T08:00:00Z", 600, 1000.0, &[3.0]);
            storage.save_run(&mut run).unwrap();
            run_id = run.id.unwrap();
        }

        // A second open finds everything applied and replays nothing
        let storage = Storage::open(dir.path()).unwrap();
        assert!(storage.fetch_run(run_id).unwrap().is_some());
        let rows: i64 = storage
            .conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_set_uploaded_id() {
        let storage = Storage::open_in_memory().unwrap();
        let mut run = completed_run("2026-08-29T08:00:00Z", 600, 1000.0, &[3.0]);
        storage.save_run(&mut run).unwrap();
        storage.set_uploaded_id(run.id.unwrap(), "12345").unwrap();
        let loaded = storage.fetch_run(run.id.unwrap()).unwrap().unwrap();
        assert_eq!(loaded.uploaded_id.as_deref(), Some("12345"));
    }
}
