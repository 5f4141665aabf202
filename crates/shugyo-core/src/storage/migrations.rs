//! History schema migrations.
//!
//! Migrations are versioned and applied when the database is opened. The
//! `schema_version` table holds a single row with the current version.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::{debug, warn};

/// Schema version after all migrations have run.
pub const CURRENT_VERSION: i32 = 2;

/// Apply all pending migrations.
///
/// # Errors
/// Returns an error if any migration statement fails. A failed migration
/// leaves the previous version recorded.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// v1: the history table as the web store kept it.
///
/// `duration` is the session's total time in seconds.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS history (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            body_part TEXT NOT NULL DEFAULT 'chest',
            sets      INTEGER NOT NULL,
            duration  INTEGER NOT NULL
        );",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()?;
    debug!("history schema migrated to v1");
    Ok(())
}

/// v2: insertion timestamp and a date index for the calendar queries.
///
/// Existing rows get their `date` as `created_at`.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE history ADD COLUMN created_at TEXT NOT NULL DEFAULT '';
         UPDATE history SET created_at = date WHERE created_at = '';
         CREATE INDEX IF NOT EXISTS idx_history_date ON history(date);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()?;
    debug!("history schema migrated to v2");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn), 0);
        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn), CURRENT_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn), CURRENT_VERSION);
    }

    #[test]
    fn v2_backfills_created_at() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        conn.execute(
            "INSERT INTO history (date, body_part, sets, duration)
             VALUES ('2024-05-01T10:00:00+00:00', 'leg', 2, 90)",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();

        let created: String = conn
            .query_row("SELECT created_at FROM history", [], |row| row.get(0))
            .unwrap();
        assert_eq!(created, "2024-05-01T10:00:00+00:00");
    }
}
