//! Drives a workout plan through its segments over time.
//!
//! The executor is deliberately clock-free: the caller feeds it elapsed wall
//! time on whatever cadence it ticks at, and reads back the target speed to
//! push to the belt. Pausing freezes plan time.

use crate::workout::plan::{Plan, SegmentSample};

/// Speed changes smaller than this are not worth a belt command.
const SPEED_EPSILON_KMH: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorStatus {
    pub segment_index: usize,
    pub segment_count: usize,
    pub segment: SegmentSample,
    /// 0.0..=1.0 across the whole plan; None when the plan is open-ended
    pub overall_progress: Option<f64>,
    pub remaining_secs: Option<f64>,
}

pub struct PlanExecutor {
    plan: Plan,
    segment_index: usize,
    /// Plan-time seconds consumed by completed segments
    completed_secs: f64,
    /// Plan-time origin of the current segment
    segment_started_at: f64,
    elapsed: f64,
    paused: bool,
    pause_started_at: Option<f64>,
    paused_total: f64,
    last_speed: f64,
    complete: bool,
}

impl PlanExecutor {
    pub fn new(plan: Plan) -> Self {
        PlanExecutor {
            plan,
            segment_index: 0,
            completed_secs: 0.0,
            segment_started_at: 0.0,
            elapsed: 0.0,
            paused: false,
            pause_started_at: None,
            paused_total: 0.0,
            last_speed: 0.0,
            complete: false,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Advance to `wall_elapsed` seconds since plan start and report where the
    /// plan stands. Returns None once the plan has finished.
    pub fn tick(&mut self, wall_elapsed: f64) -> Option<ExecutorStatus> {
        if self.complete {
            return None;
        }

        if self.paused {
            // Hold position; plan time doesn't move.
            self.elapsed = wall_elapsed;
            return Some(self.status());
        }

        self.elapsed = wall_elapsed;

        // Segments can complete back-to-back within one tick.
        loop {
            let segment = self.plan.segments.get(self.segment_index)?;
            let at = self.plan_time() - self.segment_started_at;
            let sample = segment.sample(at);

            if !sample.complete {
                return Some(self.status());
            }

            let consumed = segment.estimated_duration().unwrap_or(at);
            self.completed_secs += consumed;
            self.segment_started_at = self.completed_secs;
            self.segment_index += 1;

            if self.segment_index >= self.plan.segments.len() {
                self.complete = true;
                tracing::info!(plan = %self.plan.name, "plan complete");
                return None;
            }
            tracing::debug!(
                plan = %self.plan.name,
                segment = self.segment_index + 1,
                "advanced to next segment"
            );
        }
    }

    /// Target speed for the belt, if it changed enough since the last poll
    /// to justify a command.
    pub fn speed_command(&mut self) -> Option<f64> {
        if self.complete || self.paused {
            return None;
        }
        let segment = self.plan.segments.get(self.segment_index)?;
        let at = self.plan_time() - self.segment_started_at;
        let target = segment.sample(at).target_speed;

        if (target - self.last_speed).abs() >= SPEED_EPSILON_KMH {
            self.last_speed = target;
            Some(target)
        } else {
            None
        }
    }

    pub fn pause(&mut self) {
        if !self.paused && !self.complete {
            self.paused = true;
            self.pause_started_at = Some(self.elapsed);
        }
    }

    pub fn resume(&mut self) {
        if let Some(started) = self.pause_started_at.take() {
            self.paused_total += self.elapsed - started;
            self.paused = false;
        }
    }

    /// Jump past the current segment.
    pub fn skip_segment(&mut self) {
        if self.complete {
            return;
        }
        if let Some(segment) = self.plan.segments.get(self.segment_index) {
            tracing::info!(
                plan = %self.plan.name,
                segment = segment.name().unwrap_or("unnamed"),
                "skipping segment"
            );
        }
        let at = self.plan_time() - self.segment_started_at;
        self.completed_secs += at;
        self.segment_started_at = self.completed_secs;
        self.segment_index += 1;
        if self.segment_index >= self.plan.segments.len() {
            self.complete = true;
        }
    }

    fn plan_time(&self) -> f64 {
        // While paused, plan time holds at the instant the pause began.
        let effective = self.pause_started_at.unwrap_or(self.elapsed);
        (effective - self.paused_total).max(0.0)
    }

    fn status(&self) -> ExecutorStatus {
        let segment = &self.plan.segments[self.segment_index];
        let at = self.plan_time() - self.segment_started_at;
        let sample = segment.sample(at);

        let total = self.plan.estimated_duration();
        let overall_progress = total.map(|t| {
            if t > 0.0 {
                (self.plan_time() / t).min(1.0)
            } else {
                1.0
            }
        });
        let remaining_secs = total.map(|t| (t - self.plan_time()).max(0.0));

        ExecutorStatus {
            segment_index: self.segment_index,
            segment_count: self.plan.segments.len(),
            segment: sample,
            overall_progress,
            remaining_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workout::plan::{FixedSegment, Plan, Segment};

    fn two_stage_plan() -> Plan {
        Plan {
            name: "warmup then walk".to_string(),
            description: None,
            segments: vec![
                Segment::Fixed(FixedSegment {
                    name: Some("warmup".to_string()),
                    speed: 2.0,
                    duration_secs: 60.0,
                }),
                Segment::Fixed(FixedSegment {
                    name: Some("walk".to_string()),
                    speed: 4.0,
                    duration_secs: 120.0,
                }),
            ],
            auto_stop_on_completion: true,
            tags: vec![],
        }
    }

    #[test]
    fn test_tick_advances_through_segments() {
        let mut exec = PlanExecutor::new(two_stage_plan());

        let status = exec.tick(10.0).unwrap();
        assert_eq!(status.segment_index, 0);
        assert_eq!(status.segment.target_speed, 2.0);

        let status = exec.tick(90.0).unwrap();
        assert_eq!(status.segment_index, 1);
        assert_eq!(status.segment.target_speed, 4.0);

        assert!(exec.tick(200.0).is_none());
        assert!(exec.is_complete());
    }

    #[test]
    fn test_overall_progress_and_remaining() {
        let mut exec = PlanExecutor::new(two_stage_plan());
        let status = exec.tick(90.0).unwrap();
        assert!((status.overall_progress.unwrap() - 0.5).abs() < 1e-9);
        assert!((status.remaining_secs.unwrap() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_command_fires_on_change_only() {
        let mut exec = PlanExecutor::new(two_stage_plan());
        exec.tick(10.0);
        assert_eq!(exec.speed_command(), Some(2.0));
        exec.tick(20.0);
        assert_eq!(exec.speed_command(), None);

        exec.tick(90.0);
        assert_eq!(exec.speed_command(), Some(4.0));
    }

    #[test]
    fn test_pause_freezes_plan_time() {
        let mut exec = PlanExecutor::new(two_stage_plan());
        exec.tick(30.0);
        exec.pause();
        assert!(exec.is_paused());

        // A minute passes while paused; segment should not advance
        let status = exec.tick(90.0).unwrap();
        assert_eq!(status.segment_index, 0);

        exec.resume();
        // Plan time is wall time minus the 60 s pause
        let status = exec.tick(100.0).unwrap();
        assert_eq!(status.segment_index, 0);
        let status = exec.tick(130.0).unwrap();
        assert_eq!(status.segment_index, 1);
    }

    #[test]
    fn test_skip_segment() {
        let mut exec = PlanExecutor::new(two_stage_plan());
        exec.tick(10.0);
        exec.skip_segment();
        let status = exec.tick(11.0).unwrap();
        assert_eq!(status.segment_index, 1);
        assert_eq!(status.segment.target_speed, 4.0);

        exec.skip_segment();
        assert!(exec.is_complete());
        assert!(exec.tick(12.0).is_none());
    }

    #[test]
    fn test_multiple_segments_complete_in_one_tick() {
        let mut exec = PlanExecutor::new(two_stage_plan());
        // One giant tick swallows the whole plan
        assert!(exec.tick(500.0).is_none());
        assert!(exec.is_complete());
    }
}
