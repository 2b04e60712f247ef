//! SQLite-backed daily harvest counts.
//!
//! One row per local calendar day that saw at least one completed work
//! session. Counts travel as decimal strings, the format the data has always
//! been stored in, and a value that fails to parse is surfaced as
//! `StoreError::CorruptCount` rather than silently reset.

use std::path::{Path, PathBuf};

use chrono::{Days, Local, NaiveDate};
use rusqlite::{params, Connection};

use super::data_dir;
use crate::error::StoreError;

/// Today's date on the local calendar.
///
/// Harvest rows are keyed by the user's local day, so a session finished at
/// 23:50 counts toward the day the user experienced, whatever the UTC date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// SQLite store for per-day completed-session counts.
pub struct HarvestStore {
    conn: Connection,
}

impl HarvestStore {
    /// Open the store at `~/.config/pomato/pomato.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()?.join("pomato.db");
        Self::open_at(&path)
    }

    /// Open the store at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_conn(conn)
    }

    /// Open an in-memory store. Counts vanish with the connection; useful
    /// for tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_conn(conn)
    }

    fn from_conn(conn: Connection) -> Result<Self, StoreError> {
        let store = Self { conn };
        store
            .migrate()
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS harvests (
                day   TEXT PRIMARY KEY,
                count TEXT NOT NULL
            );",
        )
    }

    /// Completed-session count for `day`. Days never written read as zero.
    pub fn count(&self, day: NaiveDate) -> Result<u32, StoreError> {
        let key = day_key(day);
        let mut stmt = self
            .conn
            .prepare("SELECT count FROM harvests WHERE day = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(raw) => parse_count(&key, &raw),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Add one completed session to `day` and return the new count.
    pub fn increment(&self, day: NaiveDate) -> Result<u32, StoreError> {
        let next = self.count(day)?.saturating_add(1);
        self.conn.execute(
            "INSERT OR REPLACE INTO harvests (day, count) VALUES (?1, ?2)",
            params![day_key(day), next.to_string()],
        )?;
        Ok(next)
    }

    /// Days with at least one harvest within the last `days` calendar days
    /// (today included), newest first. Empty days are not reported.
    pub fn recent(&self, days: u32) -> Result<Vec<(NaiveDate, u32)>, StoreError> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let cutoff = today()
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MIN);
        let mut stmt = self
            .conn
            .prepare("SELECT day, count FROM harvests WHERE day >= ?1 ORDER BY day DESC")?;
        let rows = stmt.query_map(params![day_key(cutoff)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (raw_day, raw_count) = row?;
            let day = NaiveDate::parse_from_str(&raw_day, "%Y-%m-%d")
                .map_err(|e| StoreError::QueryFailed(format!("malformed day {raw_day:?}: {e}")))?;
            out.push((day, parse_count(&raw_day, &raw_count)?));
        }
        Ok(out)
    }
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn parse_count(day: &str, value: &str) -> Result<u32, StoreError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| StoreError::CorruptCount {
            day: day.to_string(),
            value: value.to_string(),
        })
}
