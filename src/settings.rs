//! User settings persisted as a versioned JSON config file.
//!
//! The config lives at `<data dir>/config.json`. The data directory is taken
//! from `--data-dir`, then the `BTREADMILL_DIR` environment variable, then the
//! platform data dir (e.g. `~/.local/share/btreadmill`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gps::{GpsCoordinate, TrackPattern};

pub const CONFIG_FILE_NAME: &str = "config.json";
const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

/// Per-user profile driving step counting, calorie estimates and belt defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// kilograms
    pub weight_kg: f64,
    /// meters
    pub stride_length_m: f64,
    /// km/h used for the start command's follow-up speed
    pub default_speed_kmh: f64,
    /// Drive a simulated belt instead of real hardware
    pub simulator_mode: bool,
}

impl Default for UserProfile {
    fn default() -> Self {
        UserProfile {
            weight_kg: 70.0,
            stride_length_m: 0.7,
            default_speed_kmh: 3.0,
            simulator_mode: false,
        }
    }
}

/// Synthetic GPS track options used by export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsSettings {
    pub enabled: bool,
    pub start: GpsCoordinate,
    pub pattern: TrackPattern,
    /// Scale factor for the pattern footprint (0.5 = half size)
    pub track_scale: f64,
}

impl Default for GpsSettings {
    fn default() -> Self {
        GpsSettings {
            enabled: false,
            // Somewhere generic: Golden Gate Park
            start: GpsCoordinate::new(37.7749, -122.4194),
            pattern: TrackPattern::Loop,
            track_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub profile: UserProfile,
    pub gps: GpsSettings,
    /// Strava API bearer token with `activity:write` scope
    pub strava_access_token: Option<String>,
}

/// On-disk envelope. Versioned so a future schema change can migrate
/// instead of silently misreading old files.
#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    version: u32,
    settings: Settings,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

impl Settings {
    /// Load settings from the data directory. A missing file yields defaults;
    /// a corrupt or future-versioned file is an error.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Settings::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {path:?}"))?;
        let file: ConfigFile = serde_json::from_str(&raw)
            .with_context(|| format!("config file is corrupted: {path:?}"))?;

        if file.version != CURRENT_VERSION {
            return Err(SettingsError::UnsupportedVersion(file.version).into());
        }

        Ok(file.settings)
    }

    /// Write settings back, refreshing the modification stamp and preserving
    /// the original creation stamp when present.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data dir: {data_dir:?}"))?;
        let path = data_dir.join(CONFIG_FILE_NAME);

        let created_at = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str::<ConfigFile>(&raw).ok())
            .map(|f| f.created_at)
            .unwrap_or_else(Utc::now);

        let file = ConfigFile {
            version: CURRENT_VERSION,
            settings: self.clone(),
            created_at,
            last_modified: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&path, json).with_context(|| format!("failed to write config: {path:?}"))?;
        Ok(())
    }
}

/// Resolve the data directory from flag, environment, or platform default.
pub fn resolve_data_dir(flag: Option<&str>) -> PathBuf {
    if let Some(dir) = flag {
        return PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("BTREADMILL_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("btreadmill")
}

/// Directory holding workout plan JSON files.
pub fn plans_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("plans")
}
