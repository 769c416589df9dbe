//! Database initialization: connection options and the embedded schema.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Bumped whenever `schema.sql` changes shape.
pub const SCHEMA_VERSION: i64 = 1;

/// Concurrent uploads queue on the write lock for at most this long.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the SQLite database and apply the schema.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    apply_schema(&pool).await?;

    info!(path = %db_path, schema_version = SCHEMA_VERSION, "Database ready");
    Ok(pool)
}

/// Apply `schema.sql` in one transaction. Every statement is idempotent.
async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let statements = include_str!("schema.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let mut applied = 0usize;
    for statement in statements {
        sqlx::query(statement).execute(&mut *tx).await?;
        applied += 1;
    }

    // PRAGMA arguments cannot be bound.
    sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    debug!(statements = applied, "Schema applied");
    Ok(())
}

/// Schema version recorded in the database file.
pub async fn schema_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("PRAGMA user_version").fetch_one(pool).await?;
    Ok(row.get(0))
}
