//! SQLite-backed session history.
//!
//! One row per finished session in the `history` table. Timestamps are
//! stored as RFC 3339 strings in UTC.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{data_dir, migrations};
use crate::error::{DatabaseError, StoreError};
use crate::history::{BodyPart, HistoryRecord, HistoryStore, NewHistoryRecord};

const SELECT_COLUMNS: &str = "SELECT id, date, body_part, sets, duration, created_at FROM history";

/// SQLite database for session history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/shugyo/shugyo.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created, or the
    /// database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir()?.join("shugyo.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "history database opened");
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<u64, DatabaseError> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get::<_, u64>(0))?;
        Ok(n)
    }
}

/// Fixed-width UTC so that `ORDER BY date` sorts chronologically.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    let date: String = row.get(1)?;
    let body_part: String = row.get(2)?;
    let created_at: String = row.get(5)?;
    Ok(HistoryRecord {
        id: row.get(0)?,
        date: parse_timestamp(1, &date)?,
        // Unknown tags from older data fall back to the default part.
        body_part: body_part.parse::<BodyPart>().unwrap_or_default(),
        sets: row.get(3)?,
        total_time_secs: row.get(4)?,
        created_at: parse_timestamp(5, &created_at)?,
    })
}

impl HistoryStore for Database {
    fn create(&mut self, record: &NewHistoryRecord) -> Result<HistoryRecord, StoreError> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO history (date, body_part, sets, duration, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                format_timestamp(&record.date),
                record.body_part.as_str(),
                record.sets,
                record.total_time_secs,
                format_timestamp(&created_at),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, sets = record.sets, "history record inserted");
        Ok(HistoryRecord {
            id,
            date: record.date,
            body_part: record.body_part,
            sets: record.sets,
            total_time_secs: record.total_time_secs,
            created_at,
        })
    }

    fn list(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY date DESC, id DESC"))?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn get(&self, id: i64) -> Result<HistoryRecord, StoreError> {
        self.conn
            .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), [id], row_to_record)
            .optional()?
            .ok_or(StoreError::NotFound(id))
    }

    fn delete(&mut self, id: i64) -> Result<(), StoreError> {
        let affected = self.conn.execute("DELETE FROM history WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn delete_all(&mut self) -> Result<usize, StoreError> {
        let affected = self.conn.execute("DELETE FROM history", [])?;
        debug!(affected, "history cleared");
        Ok(affected)
    }

    fn update(&mut self, id: i64, sets: u32, total_time_secs: u64) -> Result<(), StoreError> {
        let affected = self.conn.execute(
            "UPDATE history SET sets = ?1, duration = ?2 WHERE id = ?3",
            params![sets, total_time_secs, id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
