//! Structured workout plans.
//!
//! A plan is a named sequence of segments, stored as JSON under the data
//! directory's `plans/` folder. Segments serialize with a `{"type", "data"}`
//! envelope. Sampling a segment at an elapsed offset is pure, which keeps the
//! executor trivially testable.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::protocol::{MAX_SPEED_KMH, MIN_SPEED_KMH};

/// What the belt should do right now, according to a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSample {
    /// km/h; 0.0 during interval rest phases
    pub target_speed: f64,
    /// 0.0..=1.0; stays at 0.0 for indefinite intervals
    pub progress: f64,
    pub complete: bool,
    /// Seconds until the next speed change, when known
    pub next_transition: Option<f64>,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    Fixed(FixedSegment),
    Interval(IntervalSegment),
    Ramp(RampSegment),
}

impl Segment {
    pub fn name(&self) -> Option<&str> {
        match self {
            Segment::Fixed(s) => s.name.as_deref(),
            Segment::Interval(s) => s.name.as_deref(),
            Segment::Ramp(s) => s.name.as_deref(),
        }
    }

    /// None for indefinite intervals.
    pub fn estimated_duration(&self) -> Option<f64> {
        match self {
            Segment::Fixed(s) => Some(s.duration_secs),
            Segment::Ramp(s) => Some(s.duration_secs),
            Segment::Interval(s) => s.estimated_duration(),
        }
    }

    pub fn speed_range(&self) -> (f64, f64) {
        match self {
            Segment::Fixed(s) => (s.speed, s.speed),
            Segment::Ramp(s) => (
                s.start_speed.min(s.end_speed),
                s.start_speed.max(s.end_speed),
            ),
            Segment::Interval(s) => {
                let speeds: Vec<f64> = s.pattern.iter().map(|p| p.speed).collect();
                let min = speeds.iter().cloned().fold(f64::MAX, f64::min);
                let max = speeds.iter().cloned().fold(f64::MIN, f64::max);
                if speeds.is_empty() {
                    (MIN_SPEED_KMH, MAX_SPEED_KMH)
                } else {
                    (min, max)
                }
            }
        }
    }

    pub fn validate(&self) -> Vec<String> {
        match self {
            Segment::Fixed(s) => s.validate(),
            Segment::Interval(s) => s.validate(),
            Segment::Ramp(s) => s.validate(),
        }
    }

    pub fn sample(&self, at_secs: f64) -> SegmentSample {
        match self {
            Segment::Fixed(s) => s.sample(at_secs),
            Segment::Interval(s) => s.sample(at_secs),
            Segment::Ramp(s) => s.sample(at_secs),
        }
    }
}

fn check_speed(errors: &mut Vec<String>, what: &str, speed: f64) {
    if !(MIN_SPEED_KMH..=MAX_SPEED_KMH).contains(&speed) {
        errors.push(format!(
            "{what} {speed} km/h is outside the belt range ({MIN_SPEED_KMH}-{MAX_SPEED_KMH} km/h)"
        ));
    }
}

// ---------------------------------------------------------------------------
// Fixed

/// Hold one speed for a duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedSegment {
    #[serde(default)]
    pub name: Option<String>,
    pub speed: f64,
    pub duration_secs: f64,
}

impl FixedSegment {
    fn sample(&self, at: f64) -> SegmentSample {
        let progress = if self.duration_secs > 0.0 {
            (at / self.duration_secs).min(1.0)
        } else {
            1.0
        };
        let complete = at >= self.duration_secs;
        let remaining = (self.duration_secs - at).max(0.0);

        let label = if complete {
            format!("Completed: {:.1} km/h", self.speed)
        } else {
            format!(
                "Fixed {:.1} km/h ({} left)",
                self.speed,
                format_remaining(remaining)
            )
        };

        SegmentSample {
            target_speed: self.speed,
            progress,
            complete,
            next_transition: if complete { None } else { Some(remaining) },
            label,
        }
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_speed(&mut errors, "Speed", self.speed);
        if self.duration_secs < 10.0 {
            errors.push(format!(
                "Duration {} seconds is too short",
                self.duration_secs as u64
            ));
        }
        errors
    }
}

// ---------------------------------------------------------------------------
// Interval

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalStep {
    #[serde(default)]
    pub name: Option<String>,
    pub speed: f64,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Repeat {
    /// Run the pattern N times
    Count(u32),
    /// Loop the pattern for a total time in seconds
    Duration(f64),
    /// Loop until the plan is stopped
    Indefinite,
}

/// A repeating pattern of steps, e.g. sprint/recover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalSegment {
    #[serde(default)]
    pub name: Option<String>,
    pub pattern: Vec<IntervalStep>,
    pub repeat: Repeat,
    /// Rest between full cycles; target speed drops to zero
    #[serde(default)]
    pub rest_between_sets_secs: Option<f64>,
}

impl IntervalSegment {
    fn cycle_secs(&self) -> f64 {
        self.pattern.iter().map(|s| s.duration_secs).sum()
    }

    fn estimated_duration(&self) -> Option<f64> {
        match self.repeat {
            Repeat::Count(n) => {
                let rest = self.rest_between_sets_secs.unwrap_or(0.0);
                Some(self.cycle_secs() * n as f64 + rest * (n.saturating_sub(1)) as f64)
            }
            Repeat::Duration(total) => Some(total),
            Repeat::Indefinite => None,
        }
    }

    fn sample(&self, at: f64) -> SegmentSample {
        if self.pattern.is_empty() {
            return SegmentSample {
                target_speed: 0.0,
                progress: 1.0,
                complete: true,
                next_transition: None,
                label: "Empty interval".to_string(),
            };
        }

        let cycle = self.cycle_secs();
        let rest = self.rest_between_sets_secs.unwrap_or(0.0);
        let full_cycle = cycle + rest;

        let (progress, complete, total_cycles) = match self.repeat {
            Repeat::Count(n) => {
                let total = self.estimated_duration().unwrap_or(0.0);
                let p = if total > 0.0 { (at / total).min(1.0) } else { 1.0 };
                (p, at >= total, Some(n))
            }
            Repeat::Duration(total) => {
                let p = if total > 0.0 { (at / total).min(1.0) } else { 1.0 };
                (p, at >= total, Some((total / full_cycle).ceil() as u32))
            }
            Repeat::Indefinite => (0.0, false, None),
        };

        if complete {
            return SegmentSample {
                target_speed: 0.0,
                progress: 1.0,
                complete: true,
                next_transition: None,
                label: "Intervals complete".to_string(),
            };
        }

        let cycle_index = (at / full_cycle) as u32;
        let in_cycle = at - cycle_index as f64 * full_cycle;

        let cycle_label = match total_cycles {
            Some(n) => format!(" (cycle {}/{})", cycle_index + 1, n),
            None => String::new(),
        };

        // Rest phase after the pattern finished within this cycle
        if in_cycle >= cycle && rest > 0.0 {
            let remaining = full_cycle - in_cycle;
            return SegmentSample {
                target_speed: 0.0,
                progress,
                complete: false,
                next_transition: Some(remaining),
                label: format!("Rest - {}s left{cycle_label}", remaining as u64),
            };
        }

        // Walk the pattern to find the active step
        let mut step_start = 0.0;
        for (idx, step) in self.pattern.iter().enumerate() {
            if in_cycle < step_start + step.duration_secs {
                let remaining = step_start + step.duration_secs - in_cycle;
                let step_name = step
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("Step {}", idx + 1));
                return SegmentSample {
                    target_speed: step.speed,
                    progress,
                    complete: false,
                    next_transition: Some(remaining),
                    label: format!(
                        "{step_name}: {:.1} km/h - {}s{cycle_label}",
                        step.speed, remaining as u64
                    ),
                };
            }
            step_start += step.duration_secs;
        }

        // Past the pattern with no rest: wrap into the next cycle's first step
        let step = &self.pattern[0];
        SegmentSample {
            target_speed: step.speed,
            progress,
            complete: false,
            next_transition: Some(step.duration_secs),
            label: format!("{:.1} km/h{cycle_label}", step.speed),
        }
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.pattern.is_empty() {
            errors.push("Interval pattern cannot be empty".to_string());
        }
        for (idx, step) in self.pattern.iter().enumerate() {
            check_speed(&mut errors, &format!("Step {} speed", idx + 1), step.speed);
            if step.duration_secs < 5.0 {
                errors.push(format!("Step {} duration is too short", idx + 1));
            }
        }
        if let Repeat::Count(0) = self.repeat {
            errors.push("Repeat count must be at least 1".to_string());
        }
        errors
    }
}

// ---------------------------------------------------------------------------
// Ramp

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampCurve {
    Linear,
    /// Slow start, fast finish
    Exponential,
    /// Fast start, slow finish
    Logarithmic,
    /// S-curve
    SmoothStep,
    /// Slow start and end, fast middle
    EaseInOut,
}

impl RampCurve {
    /// Map linear progress [0,1] onto the curve.
    fn apply(self, p: f64) -> f64 {
        let p = p.clamp(0.0, 1.0);
        match self {
            RampCurve::Linear => p,
            RampCurve::Exponential => p * p,
            RampCurve::Logarithmic => (1.0 + p * (std::f64::consts::E - 1.0)).ln(),
            RampCurve::SmoothStep => p * p * (3.0 - 2.0 * p),
            RampCurve::EaseInOut => {
                if p < 0.5 {
                    2.0 * p * p
                } else {
                    1.0 - (-2.0 * p + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

/// Gradual speed change from start to end over a duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RampSegment {
    #[serde(default)]
    pub name: Option<String>,
    pub start_speed: f64,
    pub end_speed: f64,
    pub duration_secs: f64,
    #[serde(default = "default_curve")]
    pub curve: RampCurve,
}

fn default_curve() -> RampCurve {
    RampCurve::Linear
}

impl RampSegment {
    pub fn speed_at(&self, progress: f64) -> f64 {
        let factor = self.curve.apply(progress);
        self.start_speed + (self.end_speed - self.start_speed) * factor
    }

    fn sample(&self, at: f64) -> SegmentSample {
        let progress = if self.duration_secs > 0.0 {
            (at / self.duration_secs).min(1.0)
        } else {
            1.0
        };
        let speed = self.speed_at(progress);
        let complete = at >= self.duration_secs;
        let remaining = (self.duration_secs - at).max(0.0);

        let arrow = if self.end_speed > self.start_speed { "↗" } else { "↘" };
        let label = format!(
            "{arrow} {:.1} km/h ({}%) - {}",
            speed,
            (progress * 100.0) as u64,
            format_remaining(remaining)
        );

        SegmentSample {
            target_speed: speed,
            progress,
            complete,
            next_transition: if complete { None } else { Some(remaining) },
            label,
        }
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_speed(&mut errors, "Start speed", self.start_speed);
        check_speed(&mut errors, "End speed", self.end_speed);
        if self.duration_secs < 30.0 {
            errors.push(format!(
                "Ramp duration {} seconds is too short for a smooth transition",
                self.duration_secs as u64
            ));
        }
        errors
    }
}

// ---------------------------------------------------------------------------
// Plan

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub segments: Vec<Segment>,
    /// Stop the belt when the last segment finishes
    #[serde(default = "default_auto_stop")]
    pub auto_stop_on_completion: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_auto_stop() -> bool {
    true
}

impl Plan {
    /// None when any segment is open-ended.
    pub fn estimated_duration(&self) -> Option<f64> {
        self.segments
            .iter()
            .map(|s| s.estimated_duration())
            .sum::<Option<f64>>()
    }

    pub fn speed_range(&self) -> (f64, f64) {
        if self.segments.is_empty() {
            return (MIN_SPEED_KMH, MAX_SPEED_KMH);
        }
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        for segment in &self.segments {
            let (lo, hi) = segment.speed_range();
            min = min.min(lo);
            max = max.max(hi);
        }
        (min, max)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.segments.is_empty() {
            errors.push("Plan has no segments".to_string());
        }
        for segment in &self.segments {
            errors.extend(segment.validate());
        }
        errors
    }
}

/// Load every valid plan from a directory of JSON files, sorted by name.
/// Invalid files are logged and skipped rather than failing the whole load.
pub fn load_plans(dir: &Path) -> Result<Vec<Plan>> {
    let mut plans = Vec::new();

    if !dir.exists() {
        return Ok(plans);
    }

    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read plans dir: {dir:?}"))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            match fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|raw| serde_json::from_str::<Plan>(&raw).map_err(Into::into))
            {
                Ok(plan) => {
                    let errors = plan.validate();
                    if errors.is_empty() {
                        plans.push(plan);
                    } else {
                        tracing::warn!(
                            plan = %plan.name,
                            ?path,
                            "skipping invalid plan: {}",
                            errors.join(", ")
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(?path, error = %e, "failed to load plan file");
                }
            }
        }
    }

    plans.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(plans)
}

fn format_remaining(secs: f64) -> String {
    if secs < 60.0 {
        format!("{}s", secs as u64)
    } else {
        format!("{}m", (secs / 60.0) as u64)
    }
}
