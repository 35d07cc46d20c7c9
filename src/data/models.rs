//! Run records and their derived display metrics.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A recorded treadmill run.
///
/// `distance_meters` is what the belt reported for the most recent leg;
/// `distance_meters_offset` carries everything accumulated before pauses
/// (the belt's counter resets whenever it stops). Total distance is always
/// the sum of the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Option<i64>,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: Option<DateTime<Utc>>,
    pub distance_meters: f64,
    pub distance_meters_offset: f64,
    /// Pipe-separated speed samples in km/h, one per belt update
    pub speeds: String,
    pub completed: bool,
    /// Strava activity id once uploaded
    pub uploaded_id: Option<String>,
    /// Set while the run is paused; survives process restarts
    pub paused: bool,
}

impl Run {
    pub fn new(start_timestamp: DateTime<Utc>) -> Self {
        Run {
            id: None,
            start_timestamp,
            end_timestamp: None,
            distance_meters: 0.0,
            distance_meters_offset: 0.0,
            speeds: String::new(),
            completed: false,
            uploaded_id: None,
            paused: false,
        }
    }

    /// Total meters including the pre-pause offset.
    pub fn total_meters(&self) -> f64 {
        self.distance_meters + self.distance_meters_offset
    }

    pub fn total_km(&self) -> f64 {
        self.total_meters() / 1000.0
    }

    pub fn duration_secs(&self) -> f64 {
        match self.end_timestamp {
            Some(end) => (end - self.start_timestamp).num_milliseconds() as f64 / 1000.0,
            None => 0.0,
        }
    }

    /// Speed samples decoded from the pipe-separated column.
    pub fn speeds_array(&self) -> Vec<f64> {
        self.speeds
            .split('|')
            .filter_map(|s| s.parse::<f64>().ok())
            .collect()
    }

    pub fn set_speeds(&mut self, samples: &[f64]) {
        self.speeds = encode_speeds(samples);
    }

    pub fn max_speed(&self) -> f64 {
        self.speeds_array().into_iter().fold(0.0, f64::max)
    }

    /// "m:ss / km", empty when there is nothing meaningful to show.
    pub fn pace_string(&self) -> String {
        let duration = self.duration_secs();
        let km = self.total_km();
        if duration <= 0.0 || km <= 0.0 {
            return String::new();
        }
        let pace = (duration / 60.0) / km;
        if !pace.is_finite() {
            return String::new();
        }
        let minutes = pace as u64;
        let seconds = ((pace - minutes as f64) * 60.0) as u64;
        format!("{minutes}:{seconds:02} / km")
    }

    /// "1h 23m 45s" with zero leading units dropped.
    pub fn duration_string(&self) -> String {
        let total = self.duration_secs() as u64;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        if hours > 0 {
            format!("{hours}h {minutes}m {seconds}s")
        } else if minutes > 0 {
            format!("{minutes}m {seconds}s")
        } else {
            format!("{seconds}s")
        }
    }

    /// Local calendar day the run started, used for grouping and merging.
    pub fn day(&self) -> NaiveDate {
        self.start_timestamp.with_timezone(&Local).date_naive()
    }
}

/// Encode samples for the `speeds` column.
pub fn encode_speeds(samples: &[f64]) -> String {
    samples
        .iter()
        .map(|s| format!("{s:.1}"))
        .collect::<Vec<_>>()
        .join("|")
}

/// All runs of one local day, newest first.
#[derive(Debug, Clone)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub runs: Vec<Run>,
}

impl DayGroup {
    pub fn total_km(&self) -> f64 {
        self.runs.iter().map(|r| r.total_km()).sum()
    }

    pub fn title(&self) -> String {
        format!(
            "{} (total: {:.2}km)",
            self.date.format("%b %e, %Y"),
            self.total_km()
        )
    }
}
