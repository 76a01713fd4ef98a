pub mod fixtures;
pub mod tickets;

pub use fixtures::FixtureStore;
pub use tickets::{PendingBatch, TicketStore};

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};

/// Open the SQLite pool shared by the fixture and ticket stores
pub async fn connect(database_url: &str) -> Result<Pool<Sqlite>> {
    // Create data directory if needed
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .context("Invalid database URL")?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    Ok(pool)
}

/// Single-connection in-memory pool; a second connection would open a
/// different empty database.
#[cfg(test)]
pub(crate) async fn memory_pool() -> Pool<Sqlite> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database")
}
