use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::daily::{DailySelection, DailySelectionStore};

/// Persistent app state: the daily-joke selection (a cookie in the original
/// sense, id plus end-of-day expiry) and the sign-in flag.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new() -> Result<Self> {
        let app_data_dir = Self::app_data_dir()?;
        if !app_data_dir.exists() {
            std::fs::create_dir_all(&app_data_dir)?;
        }
        Self::open_at(&app_data_dir.join("state.db"))
    }

    /// Opens (and migrates) a database at an explicit path; the tests point
    /// this at a temp directory.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS daily_joke (
                slot INTEGER PRIMARY KEY CHECK (slot = 0),
                joke_id INTEGER NOT NULL,
                expires_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn app_data_dir() -> Result<PathBuf> {
        let home_dir =
            dirs_next::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home_dir.join(".joke_reader"))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Failed to lock database connection"))
    }

    pub fn is_authenticated(&self) -> Result<bool> {
        let conn = self.lock()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = 'auth'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.as_deref() == Some("true"))
    }

    pub fn set_authenticated(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('auth', 'true')",
            [],
        )?;
        Ok(())
    }

    pub fn clear_authenticated(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM settings WHERE key = 'auth'", [])?;
        Ok(())
    }
}

impl DailySelectionStore for Database {
    fn get(&self) -> Result<Option<DailySelection>> {
        let conn = self.lock()?;
        let row: Option<(u32, String)> = conn
            .query_row(
                "SELECT joke_id, expires_at FROM daily_joke WHERE slot = 0",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((joke_id, expires_at)) = row else {
            return Ok(None);
        };

        // A malformed expiry reads as no selection at all.
        let expires_at = match DateTime::parse_from_rfc3339(&expires_at) {
            Ok(parsed) => parsed.with_timezone(&Local),
            Err(e) => {
                warn!(error = %e, "discarding malformed daily-joke expiry");
                return Ok(None);
            }
        };

        let selection = DailySelection {
            joke_id,
            expires_at,
        };
        Ok(Some(selection).filter(|s| !s.is_expired()))
    }

    fn set(&self, selection: &DailySelection) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO daily_joke (slot, joke_id, expires_at) VALUES (0, ?1, ?2)",
            params![selection.joke_id, selection.expires_at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM daily_joke", [])?;
        Ok(())
    }
}
