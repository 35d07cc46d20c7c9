//! Data layer for run history.
//!
//! Runs persist in a local SQLite database; models carry the derived
//! metrics (pace, duration, speed stats) the UI and exporter need.

mod models;
mod storage;

pub use models::{DayGroup, Run};
pub use storage::Storage;
