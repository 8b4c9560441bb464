//! Loader timing configuration and the persistent settings store.
//!
//! [`LoaderConfig`] holds the knobs a run uses. [`Settings`] is a small
//! SQLite key-value table whose entries override the defaults.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::Mutex;
use std::time::Duration;

use crate::consts::{
    DEFAULT_BASE_URL, FRAME_INTERVAL, HANDOFF_GRACE, MESSAGE_INTERVAL, MIN_DURATION,
    SPRINT_DURATION,
};
use crate::messages::MessageScript;
use crate::progress::RampCurve;

/// Settings key for the backend base URL.
pub const KEY_BASE_URL: &str = "base_url";
/// Settings key for the minimum on-screen duration, in milliseconds.
pub const KEY_MIN_DURATION_MS: &str = "min_duration_ms";

/// Keys [`Settings`] understands.
pub const KNOWN_KEYS: &[&str] = &[KEY_BASE_URL, KEY_MIN_DURATION_MS];

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub frame: Duration,
    pub min_duration: Duration,
    pub sprint: Duration,
    pub handoff_grace: Duration,
    pub message_interval: Duration,
    pub curve: RampCurve,
    pub script: MessageScript,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            frame: FRAME_INTERVAL,
            min_duration: MIN_DURATION,
            sprint: SPRINT_DURATION,
            handoff_grace: HANDOFF_GRACE,
            message_interval: MESSAGE_INTERVAL,
            curve: RampCurve::default(),
            script: MessageScript::default(),
        }
    }
}

/// Persistent key-value settings backed by SQLite.
pub struct Settings {
    conn: Mutex<Connection>,
}

impl Settings {
    /// Open or create the settings table. Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open settings database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .context("failed to create settings table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Upsert a value.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(())
    }

    /// Persisted backend URL, or the default.
    pub fn base_url(&self) -> Result<String> {
        Ok(self
            .get(KEY_BASE_URL)?
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()))
    }

    /// Overlay persisted values onto `config`.
    pub fn apply(&self, config: &mut LoaderConfig) -> Result<()> {
        if let Some(raw) = self.get(KEY_MIN_DURATION_MS)? {
            let ms: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {KEY_MIN_DURATION_MS}: {raw:?}"))?;
            config.min_duration = Duration::from_millis(ms);
        }
        Ok(())
    }
}
