//! # SQLite store
//!
//! Implements every `domains` port over a single `SqlitePool`. Multi-row
//! operations (conversation delivery, vote accumulation, entry lifecycle
//! writes with their application status recompute, verification
//! replacement, registration) run inside one transaction so a failure
//! never leaves half a write behind. Each of these transactions writes
//! first, so it holds SQLite's write lock before it reads anything.

mod authors;
mod categories;
mod entries;
mod messaging;
mod records;
mod topics;

use std::str::FromStr;
use std::time::Duration;

use domains::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Decode, Row, Sqlite, Type};
use tracing::info;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and applies pending
    /// migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(db_err)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        // Readers keep reading while one connection writes.
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to an in-memory database sees its own empty
        // database, so those pools are pinned to one long-lived connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await.map_err(db_err)?;
        let store = Self { pool };
        store.migrate().await?;
        info!(in_memory, "sqlite store ready");
        Ok(store)
    }

    /// A private, empty, migrated database. Used by tests and the seeder's dry run.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Maps driver errors onto the domain: unique violations become
/// `Conflict`, everything else is `Internal`.
pub(crate) fn db_err(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return AppError::Conflict(db.message().to_string());
        }
    }
    AppError::Internal(err.to_string())
}

pub(crate) fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name).map_err(db_err)
}

/// Parses a text column into a domain enum or decimal; bad values mean a
/// corrupt row, not bad input.
pub(crate) fn parse_col<T>(row: &SqliteRow, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = col(row, name)?;
    raw.parse()
        .map_err(|e: T::Err| AppError::Internal(format!("column `{name}` holds `{raw}`: {e}")))
}

pub(crate) fn count(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|e| AppError::Internal(e.to_string()))
}
