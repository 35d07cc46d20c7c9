//! GPX export for recorded runs.
//!
//! Builds a GPX 1.1 track from a run's speed samples: one track point per
//! sample, with positions taken from a synthetic GPS track so indoor walks
//! still render as a route. Timestamps are interpolated evenly across the
//! run's duration.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeDelta, Utc};

use crate::data::Run;
use crate::gps::TrackGenerator;

const GPX_CREATOR: &str = "btreadmill";

/// Render a run as a GPX 1.1 document.
pub fn run_to_gpx(run: &Run, track: &TrackGenerator) -> Result<String> {
    let end = match run.end_timestamp {
        Some(end) => end,
        None => bail!("run has no end timestamp; finish it before exporting"),
    };
    let speeds = run.speeds_array();
    if speeds.is_empty() {
        bail!("run has no speed samples to export");
    }
    let total_km = run.total_km();
    if total_km <= 0.0 {
        bail!("run covers no distance");
    }

    let duration = (end - run.start_timestamp).num_milliseconds() as f64 / 1000.0;
    let mut gpx = String::with_capacity(1024 + speeds.len() * 160);
    gpx.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    gpx.push_str(&format!(
        "<gpx version=\"1.1\" creator=\"{GPX_CREATOR}\" \
         xmlns=\"http://www.topografix.com/GPX/1/1\">\n"
    ));
    gpx.push_str("  <metadata>\n");
    gpx.push_str(&format!(
        "    <time>{}</time>\n",
        format_time(&run.start_timestamp)
    ));
    gpx.push_str("  </metadata>\n");
    gpx.push_str("  <trk>\n    <name>Treadmill Walk</name>\n    <type>walking</type>\n");
    gpx.push_str("    <trkseg>\n");

    // Each sample gets an even share of the duration and the distance. The
    // belt reports samples at a steady cadence, so this is close to the truth
    // without needing per-sample timestamps in the database.
    let n = speeds.len();
    for (i, _speed) in speeds.iter().enumerate() {
        let fraction = if n > 1 { i as f64 / (n - 1) as f64 } else { 1.0 };
        let point = track.coordinate_at(total_km * fraction);
        let at = run.start_timestamp + TimeDelta::milliseconds((duration * fraction * 1000.0) as i64);
        gpx.push_str(&format!(
            "      <trkpt lat=\"{:.6}\" lon=\"{:.6}\">\n        <time>{}</time>\n      </trkpt>\n",
            point.latitude,
            point.longitude,
            format_time(&at)
        ));
    }

    gpx.push_str("    </trkseg>\n  </trk>\n</gpx>\n");
    Ok(gpx)
}

/// Write the GPX document for a run to `path`.
pub fn export_run(run: &Run, track: &TrackGenerator, path: &Path) -> Result<()> {
    let gpx = run_to_gpx(run, track)?;
    std::fs::write(path, gpx).with_context(|| format!("Failed to write GPX file: {path:?}"))?;
    tracing::info!(?path, "exported run");
    Ok(())
}

fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::{GpsCoordinate, TrackPattern};

    fn track() -> TrackGenerator {
        TrackGenerator::new(GpsCoordinate::new(37.7749, -122.4194), TrackPattern::Loop, 1.0)
    }

    fn finished_run() -> Run {
        let start: DateTime<Utc> = "2026-08-29T08:00:00Z".parse().unwrap();
        let mut run = Run::new(start);
        run.end_timestamp = Some(start + TimeDelta::seconds(600));
        run.distance_meters = 1000.0;
        run.completed = true;
        run.set_speeds(&[3.0, 3.5, 4.0, 3.5, 3.0]);
        run
    }

    #[test]
    fn test_gpx_document_shape() {
        let gpx = run_to_gpx(&finished_run(), &track()).unwrap();
        assert!(gpx.starts_with("<?xml version=\"1.0\""));
        assert!(gpx.contains("<gpx version=\"1.1\""));
        assert!(gpx.contains("<name>Treadmill Walk</name>"));
        assert_eq!(gpx.matches("<trkpt").count(), 5);
        assert!(gpx.ends_with("</gpx>\n"));
    }

    #[test]
    fn test_timestamps_span_the_run() {
        let gpx = run_to_gpx(&finished_run(), &track()).unwrap();
        assert!(gpx.contains("<time>2026-08-29T08:00:00Z</time>"));
        assert!(gpx.contains("<time>2026-08-29T08:10:00Z</time>"));
    }

    #[test]
    fn test_unfinished_run_rejected() {
        let mut run = finished_run();
        run.end_timestamp = None;
        assert!(run_to_gpx(&run, &track()).is_err());
    }

    #[test]
    fn test_run_without_samples_rejected() {
        let mut run = finished_run();
        run.speeds = String::new();
        assert!(run_to_gpx(&run, &track()).is_err());
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walk.gpx");
        export_run(&finished_run(), &track(), &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<trkseg>"));
    }
}
