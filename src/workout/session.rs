//! The live run session.
//!
//! A session accumulates belt telemetry into run totals. The belt's own
//! distance counter resets every time it stops, so pausing latches the
//! current totals as offsets and post-resume snapshots stack on top of them.
//! The same offset mechanism seeds a session resumed from a persisted row
//! after a process restart.

use chrono::{DateTime, Utc};

use crate::protocol::RunSnapshot;

/// Calories burned per kg of body weight per km walked.
const CALORIES_PER_KG_KM: f64 = 0.75;

#[derive(Debug, Clone)]
pub struct Session {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,

    /// km, including everything latched before pauses
    pub total_distance: f64,
    /// Seconds the belt was actually moving (pauses excluded)
    pub active_secs: f64,
    /// km/h
    pub current_speed: f64,
    pub max_speed: f64,
    pub average_speed: f64,
    /// minutes per km
    pub average_pace: f64,
    pub total_steps: u64,
    pub estimated_calories: u64,
    pub paused: bool,

    /// One entry per belt update, for the speed chart
    pub speed_history: Vec<f64>,

    // Totals latched at pause time; belt counters restart from zero on resume.
    distance_offset: f64,
    steps_offset: u64,
    /// Speed to restore when resuming
    pub speed_before_pause: f64,

    weight_kg: f64,
    last_update: DateTime<Utc>,
    /// Multiplier applied to wall-clock deltas in simulator demo mode
    time_factor: f64,
}

impl Session {
    pub fn new(started_at: DateTime<Utc>, weight_kg: f64, time_factor: f64) -> Self {
        Session {
            started_at,
            ended_at: None,
            total_distance: 0.0,
            active_secs: 0.0,
            current_speed: 0.0,
            max_speed: 0.0,
            average_speed: 0.0,
            average_pace: 0.0,
            total_steps: 0,
            estimated_calories: 0,
            paused: false,
            speed_history: Vec::new(),
            distance_offset: 0.0,
            steps_offset: 0,
            speed_before_pause: 0.0,
            weight_kg,
            last_update: started_at,
            time_factor: if time_factor > 0.0 { time_factor } else { 1.0 },
        }
    }

    /// Rebuild a paused session from a persisted run so it can continue
    /// after a restart. The stored distance becomes the offset.
    pub fn resume_from(
        started_at: DateTime<Utc>,
        distance_km: f64,
        speed_history: Vec<f64>,
        weight_kg: f64,
        stride_m: f64,
        time_factor: f64,
    ) -> Self {
        let mut session = Session::new(started_at, weight_kg, time_factor);
        session.total_distance = distance_km;
        session.distance_offset = distance_km;
        session.steps_offset = ((distance_km * 1000.0) / stride_m.max(0.01)) as u64;
        session.total_steps = session.steps_offset;
        session.speed_history = speed_history;
        session.paused = true;
        session
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Fold one belt snapshot into the totals. A paused session only
    /// advances its clock reference.
    pub fn update(&mut self, snapshot: &RunSnapshot) {
        let delta = (snapshot.timestamp - self.last_update)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0;

        if !self.paused {
            self.active_secs += delta * self.time_factor;

            self.total_distance = self.distance_offset + snapshot.distance;
            self.total_steps = self.steps_offset + snapshot.steps;

            self.current_speed = snapshot.speed;
            if self.current_speed > self.max_speed {
                self.max_speed = self.current_speed;
            }
            self.speed_history.push(snapshot.speed);

            if self.active_secs > 0.0 {
                self.average_speed = self.total_distance / (self.active_secs / 3600.0);
                if self.total_distance > 0.0 {
                    self.average_pace = (self.active_secs / 60.0) / self.total_distance;
                }
            }

            self.estimated_calories =
                (self.total_distance * self.weight_kg * CALORIES_PER_KG_KM) as u64;
        }

        self.last_update = snapshot.timestamp;
    }

    /// Latch totals and stop accumulating. The belt is expected to stop;
    /// its counters will restart from zero on the next start.
    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.distance_offset = self.total_distance;
        self.steps_offset = self.total_steps;
        self.speed_before_pause = self.current_speed;
        self.current_speed = 0.0;
        self.paused = true;
    }

    /// Resume accumulating at `at`. No snapshots arrive while the belt is
    /// stopped, so the clock reference has to be reset here or the whole
    /// pause would land in `active_secs` on the first post-resume update.
    pub fn resume(&mut self, at: DateTime<Utc>) {
        if self.paused {
            self.paused = false;
            self.last_update = at;
        }
    }

    pub fn end(&mut self, at: DateTime<Utc>) {
        self.ended_at = Some(at);
        self.paused = false;
        self.current_speed = 0.0;
    }

    /// Wall-clock duration including pauses.
    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.ended_at.unwrap_or(now) - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn snapshot(at: DateTime<Utc>, speed: f64, distance: f64) -> RunSnapshot {
        RunSnapshot::new(at, speed, distance, 0.7)
    }

    fn t0() -> DateTime<Utc> {
        "2026-08-29T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_update_accumulates_totals() {
        let mut s = Session::new(t0(), 70.0, 1.0);
        s.update(&snapshot(t0() + TimeDelta::seconds(60), 3.0, 0.05));
        s.update(&snapshot(t0() + TimeDelta::seconds(120), 3.6, 0.1));

        assert!((s.total_distance - 0.1).abs() < 1e-9);
        assert!((s.active_secs - 120.0).abs() < 1e-9);
        assert!((s.current_speed - 3.6).abs() < 1e-9);
        assert!((s.max_speed - 3.6).abs() < 1e-9);
        // 0.1 km over 120 s = 3.0 km/h
        assert!((s.average_speed - 3.0).abs() < 1e-9);
        // 2 min / 0.1 km = 20 min/km
        assert!((s.average_pace - 20.0).abs() < 1e-9);
        assert_eq!(s.speed_history, vec![3.0, 3.6]);
    }

    #[test]
    fn test_calories_scale_with_weight() {
        let mut light = Session::new(t0(), 50.0, 1.0);
        let mut heavy = Session::new(t0(), 100.0, 1.0);
        let snap = snapshot(t0() + TimeDelta::seconds(3600), 4.0, 4.0);
        light.update(&snap);
        heavy.update(&snap);
        assert_eq!(light.estimated_calories, 150); // 4 * 50 * 0.75
        assert_eq!(heavy.estimated_calories, 300);
    }

    #[test]
    fn test_pause_latches_offsets_for_belt_restart() {
        let mut s = Session::new(t0(), 70.0, 1.0);
        s.update(&snapshot(t0() + TimeDelta::seconds(600), 3.0, 0.5));
        s.pause();
        assert!(s.paused);
        assert_eq!(s.current_speed, 0.0);
        assert!((s.speed_before_pause - 3.0).abs() < 1e-9);

        // Belt restarted: its counter begins again at zero
        s.resume(t0() + TimeDelta::seconds(650));
        s.update(&snapshot(t0() + TimeDelta::seconds(700), 3.0, 0.1));
        assert!((s.total_distance - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_paused_time_not_counted_as_active() {
        let mut s = Session::new(t0(), 70.0, 1.0);
        s.update(&snapshot(t0() + TimeDelta::seconds(60), 3.0, 0.05));
        s.pause();
        // Ten minutes pass with the belt stopped; no snapshots arrive.
        s.resume(t0() + TimeDelta::seconds(660));
        s.update(&snapshot(t0() + TimeDelta::seconds(720), 3.0, 0.05));

        assert!((s.active_secs - 120.0).abs() < 1e-9);
        // 0.1 km over 120 s of belt time, not 720 s of wall time
        assert!((s.average_speed - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_resume_from_row_excludes_downtime() {
        let mut s = Session::resume_from(t0(), 1.0, vec![3.0], 70.0, 0.7, 1.0);
        // Process restarted two hours after the original start
        s.resume(t0() + TimeDelta::seconds(7200));
        s.update(&snapshot(t0() + TimeDelta::seconds(7260), 3.0, 0.05));

        assert!((s.active_secs - 60.0).abs() < 1e-9);
        assert!((s.total_distance - 1.05).abs() < 1e-9);
    }

    #[test]
    fn test_resume_from_persisted_row() {
        let s = Session::resume_from(t0(), 1.4, vec![3.0, 3.5], 70.0, 0.7, 1.0);
        assert!(s.paused);
        assert!((s.total_distance - 1.4).abs() < 1e-9);
        assert_eq!(s.total_steps, 2000);
        assert_eq!(s.speed_history.len(), 2);
    }

    #[test]
    fn test_time_factor_accelerates_demo_clock() {
        let mut s = Session::new(t0(), 70.0, 60.0);
        s.update(&snapshot(t0() + TimeDelta::seconds(1), 3.0, 0.05));
        assert!((s.active_secs - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_end_clears_pause_flag() {
        let mut s = Session::new(t0(), 70.0, 1.0);
        s.pause();
        s.end(t0() + TimeDelta::seconds(100));
        assert!(!s.paused);
        assert!(!s.is_active());
        assert_eq!(s.elapsed(t0()), TimeDelta::seconds(100));
    }
}
