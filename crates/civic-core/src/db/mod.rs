//! SQLite-backed view store.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so readers never wait on the single writer
//! - `busy_timeout` from config; a writer still blocked after it surfaces
//!   as [`crate::error::StoreError::NoResponse`]
//! - no foreign keys: views reference nothing, consistency is maintained
//!   by the fan-out adapter

pub mod migrations;
pub mod schema;
pub mod session;

pub use session::{Assignment, KeyPart, Order, Predicate, Row, Session, SqliteSession};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

/// Busy timeout used when configuration does not override it.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the store at `path`, apply runtime pragmas, and migrate
/// the schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_store(path: &Path, busy_timeout: Duration) -> Result<SqliteSession> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open store {}", path.display()))?;

    configure_connection(&conn, busy_timeout).context("configure sqlite pragmas")?;
    let version = migrations::migrate(&mut conn).context("apply store migrations")?;
    tracing::debug!(path = %path.display(), version, "store opened");

    Ok(SqliteSession::new(conn))
}

/// Open a private in-memory store, migrated and ready for use.
///
/// # Errors
///
/// Returns an error if SQLite cannot create the database.
pub fn open_in_memory() -> Result<SqliteSession> {
    let mut conn = Connection::open_in_memory().context("open in-memory store")?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    migrations::migrate(&mut conn).context("apply store migrations")?;
    Ok(SqliteSession::new(conn))
}

/// Stamp the time of the last completed repair into `store_meta`.
///
/// # Errors
///
/// Returns an error if the metadata row cannot be written.
pub fn record_repair(session: &SqliteSession, at: DateTime<Utc>) -> Result<()> {
    session
        .connection()
        .execute(
            "UPDATE store_meta SET last_repair_at_us = ?1 WHERE id = 1",
            [at.timestamp_micros()],
        )
        .context("record repair time")?;
    Ok(())
}

/// When repair last completed, if ever.
///
/// # Errors
///
/// Returns an error if the metadata row cannot be read.
pub fn last_repair_at(session: &SqliteSession) -> Result<Option<DateTime<Utc>>> {
    let micros: i64 = session
        .connection()
        .query_row(
            "SELECT last_repair_at_us FROM store_meta WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .context("read repair time")?;
    Ok((micros > 0)
        .then(|| DateTime::from_timestamp_micros(micros))
        .flatten())
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}
