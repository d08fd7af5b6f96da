//! Database pool with split reader/writer connections in WAL mode.
//!
//! The conversation cache is one table written on every merge and read on
//! cold start. `DatabasePool` keeps a single writer so merges for different
//! conversations serialize at SQLite's lock instead of retrying, and a small
//! read-only pool for hydration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

/// Read-only connections; hydration is the only reader.
const READER_CONNECTIONS: u32 = 2;

/// How long a connection waits on SQLite's lock before failing the query.
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

/// Split read/write pool for the local cache database.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open (creating if missing) the database and run migrations on the
    /// writer before the reader pool is opened.
    ///
    /// Runs with `synchronous = NORMAL`: a cache row lost to a power cut is
    /// refetched on the next load.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let cache_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .create_if_missing(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(cache_opts.clone())
            .await?;

        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(READER_CONNECTIONS)
            .connect_with(cache_opts.read_only(true))
            .await?;

        Ok(Self { reader, writer })
    }
}

/// Database URL for `farmlink.db` inside `data_dir`.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}/farmlink.db", data_dir.display())
}
