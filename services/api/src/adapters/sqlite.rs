//! services/api/src/adapters/sqlite.rs
//!
//! Connection setup shared by the SQLite-backed stores. Each store lives in its
//! own directory (the configured `*_DB_PATH`) with a single database file inside.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

const MAX_CONNECTIONS: u32 = 5;

/// Opens (creating if needed) `dir/file_name` in WAL mode.
pub async fn open_pool(dir: &Path, file_name: &str) -> Result<SqlitePool, sqlx::Error> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;
    info!("Opened SQLite database at {}", path.display());
    Ok(pool)
}

/// Maps a driver error onto the port error space.
pub(crate) fn port_error(e: sqlx::Error) -> tutor_core::ports::PortError {
    use tutor_core::ports::PortError;
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound("row not found".to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => PortError::Conflict(db.message().to_string()),
        other => PortError::Unexpected(other.to_string()),
    }
}
