//! # Record Store
//!
//! Periodic snapshots of the canonical channel readings in an embedded
//! sqlite database.
//!
//! This module handles:
//! - Opening the versioned database file
//! - Idempotent creation of the three channel tables
//! - Appending one `(date, value, um)` row per channel per persistence tick
//!
//! Rows are append-only; nothing here updates or deletes. Write failures
//! are surfaced to the caller, who reports them through the notice channel
//! and keeps acquiring.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::telemetry::frame::ChannelId;

/// Wall-clock format written to the `date` column
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Database file name, deterministic per crate version
pub fn database_file_name() -> String {
    format!("cansat-records-strv{}.db", env!("CARGO_PKG_VERSION"))
}

/// Append-only sqlite store with one table per channel
pub struct RecordStore {
    conn: Connection,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").finish_non_exhaustive()
    }
}

impl RecordStore {
    /// Open (or create) the versioned database file inside `dir`
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or the channel tables
    /// cannot be created
    pub fn open_default(dir: &Path) -> Result<Self> {
        let path: PathBuf = dir.join(database_file_name());
        Self::open(&path)
    }

    /// Open (or create) a database at an explicit path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::create_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Create the three channel tables if they do not exist yet.
    ///
    /// Reopening an existing database is a no-op.
    fn create_tables(conn: &Connection) -> Result<()> {
        for channel in ChannelId::ALL {
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {}(date datetime, value real, um text)",
                channel.table()
            );
            conn.execute(&sql, [])?;
        }
        Ok(())
    }

    /// Append one record for a channel, stamped with the local wall clock
    ///
    /// # Arguments
    ///
    /// * `channel` - Channel whose table receives the row
    /// * `value` - Canonical-unit value to persist
    /// * `unit_label` - Unit label written to the `um` column
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails; the caller treats this as
    /// non-fatal
    pub fn append(&self, channel: ChannelId, value: f64, unit_label: &str) -> Result<()> {
        let date = chrono::Local::now().format(DATE_FORMAT).to_string();
        let sql = format!("INSERT INTO {} VALUES (?1, ?2, ?3)", channel.table());
        self.conn.execute(&sql, params![date, value, unit_label])?;
        Ok(())
    }
}
