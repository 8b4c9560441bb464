//! Project-wide constants.

use std::path::PathBuf;
use std::time::Duration;

/// Soft ceiling the ramp phase approaches but never crosses.
pub const RAMP_CEILING: f64 = 90.0;

/// Fraction of the remaining distance to the ceiling covered per frame.
pub const RAMP_RATE: f64 = 0.015;

/// Largest single-frame increment during the ramp.
pub const RAMP_MAX_STEP: f64 = 0.4;

/// Target of the slow creep once the ceiling is reached. Stays below 100.
pub const CREEP_TARGET: f64 = 99.0;

/// Fraction of the remaining distance to [`CREEP_TARGET`] covered per frame.
pub const CREEP_RATE: f64 = 0.001;

/// Display refresh period (≈60 Hz).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Length of the post-completion sprint to 100%.
pub const SPRINT_DURATION: Duration = Duration::from_millis(1100);

/// Extra pause after 100% so the full bar is actually seen.
pub const HANDOFF_GRACE: Duration = Duration::from_millis(200);

/// How long each status message stays up.
pub const MESSAGE_INTERVAL: Duration = Duration::from_millis(1500);

/// Minimum time the loading screen is shown, however fast the backend is.
pub const MIN_DURATION: Duration = Duration::from_millis(3000);

/// Backend used when neither the CLI nor the settings store names one.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default settings path: `~/.report-loader/settings.db`.
pub fn default_db_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".report-loader").join("settings.db"))
}
