//! Wire protocol for the RZ_TreadMill walking pad.
//!
//! Commands are fixed 9-byte frames delimited by 0xFB/0xFC. Status frames are
//! pushed by the belt; short frames signal idle/hibernation, full frames carry
//! a running snapshot (speed, distance counters).

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Speed limits of the belt in km/h. Commands outside this range are clamped.
pub const MIN_SPEED_KMH: f64 = 1.0;
pub const MAX_SPEED_KMH: f64 = 6.0;

/// Default stride length in meters, used to derive steps from distance
/// when the profile doesn't override it.
pub const DEFAULT_STRIDE_M: f64 = 0.7;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid hex string: {0:?}")]
    InvalidHex(String),
}

/// Commands the belt understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Start,
    /// Target speed in km/h. Clamped to [1.0, 6.0] and rounded to 0.1.
    Speed(f64),
    Stop,
}

impl Command {
    /// Encode to the raw frame sent over the write characteristic.
    pub fn to_frame(self) -> Vec<u8> {
        match self {
            Command::Start => parse_hex("FB07A201010500B0FC").expect("fixed frame"),
            Command::Stop => parse_hex("FB07A204010000AEFC").expect("fixed frame"),
            Command::Speed(kmh) => {
                // Round to nearest 0.1 before scaling to avoid float drift
                // pushing the payload off by one unit.
                let rounded = (kmh * 10.0).round() / 10.0;
                let units = (rounded.clamp(MIN_SPEED_KMH, MAX_SPEED_KMH) * 10.0).round() as u8;
                let checksum = 0xAB_u8.wrapping_add(units);
                vec![0xFB, 0x07, 0xA1, 0x02, 0x01, units, 0x00, checksum, 0xFC]
            }
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Start => write!(f, "start"),
            Command::Speed(v) => write!(f, "speed {v}"),
            Command::Stop => write!(f, "stop"),
        }
    }
}

/// A single telemetry sample while the belt is moving.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub timestamp: DateTime<Utc>,
    /// km/h
    pub speed: f64,
    /// kilometers since the belt started
    pub distance: f64,
    pub steps: u64,
}

impl RunSnapshot {
    /// Build a snapshot, deriving steps from distance and stride length
    /// when the belt doesn't report them (this model never does).
    pub fn new(timestamp: DateTime<Utc>, speed: f64, distance: f64, stride_m: f64) -> Self {
        let stride = if stride_m > 0.0 { stride_m } else { DEFAULT_STRIDE_M };
        let steps = ((distance * 1000.0) / stride).max(0.0) as u64;
        RunSnapshot {
            timestamp,
            speed,
            distance,
            steps,
        }
    }

}

/// Belt state decoded from a status frame.
#[derive(Debug, Clone, PartialEq)]
pub enum BeltState {
    Unknown,
    Hibernated,
    Idling,
    Starting,
    Running(RunSnapshot),
    Stopping(RunSnapshot),
}

impl BeltState {
    pub fn snapshot(&self) -> Option<&RunSnapshot> {
        match self {
            BeltState::Running(s) | BeltState::Stopping(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_moving(&self) -> bool {
        matches!(self, BeltState::Running(_) | BeltState::Stopping(_))
    }
}

/// Decode a status frame into a belt state.
///
/// Frames shorter than 18 bytes carry no telemetry: byte 1 == 4 means the belt
/// has gone to sleep, anything else is idle chatter. Full frames dispatch on
/// byte 3: 1 starting, 2 running, 4/5 stopping.
pub fn parse_state(frame: &[u8], stride_m: f64, now: DateTime<Utc>) -> BeltState {
    if frame.len() < 18 {
        if frame.len() > 1 && frame[1] == 4 {
            return BeltState::Hibernated;
        }
        return BeltState::Idling;
    }

    match frame[3] {
        1 => BeltState::Starting,
        2 => BeltState::Running(parse_snapshot(frame, stride_m, now)),
        4 | 5 => BeltState::Stopping(parse_snapshot(frame, stride_m, now)),
        _ => BeltState::Idling,
    }
}

/// Decode the telemetry bytes of a full status frame.
///
/// Speed is in 0.1 km/h units at byte 5. Distance is split across two
/// counters: byte 12 holds hundredths of a km, byte 11 is a high-order
/// counter worth 2.56 km per unit (the belt's odometer wraps at 2.56 km).
fn parse_snapshot(frame: &[u8], stride_m: f64, now: DateTime<Utc>) -> RunSnapshot {
    if frame.len() < 13 {
        tracing::warn!(len = frame.len(), "status frame too short for telemetry");
        return RunSnapshot::new(now, 0.0, 0.0, stride_m);
    }

    let speed = frame[5] as f64 / 10.0;
    let distance_low = frame[12] as f64 / 100.0;
    let distance_high = frame[11] as f64 / 100.0;
    let distance = distance_low + distance_high * 256.0;

    RunSnapshot::new(now, speed, distance, stride_m)
}

/// Parse a hex string like "FB07A2..." into bytes.
pub fn parse_hex(hex: &str) -> Result<Vec<u8>, ProtocolError> {
    if hex.len() % 2 != 0 {
        return Err(ProtocolError::InvalidHex(hex.to_string()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| ProtocolError::InvalidHex(hex.to_string()))
        })
        .collect()
}

/// Format bytes as an uppercase hex string.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}
