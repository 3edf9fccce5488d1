//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Embedded migrations that are run automatically on connect.
static PRIMARY: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/primary");
static FILELISTS: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/filelists");
static OTHER: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/other");
/// The index has exactly one writer.
const MAX_CONNECTIONS: u32 = 1;

/// The three databases of a createrepo repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// One row per package, with its descriptive metadata.
    Primary,
    /// Files owned by each package.
    Filelists,
    /// Changelog entries.
    Other,
}
impl IndexKind {
    pub const ALL: [IndexKind; 3] = [Self::Primary, Self::Filelists, Self::Other];

    /// Conventional file name inside `repodata/`.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Primary => "primary.sqlite",
            Self::Filelists => "filelists.sqlite",
            Self::Other => "other.sqlite",
        }
    }

    fn migrator(self) -> &'static sqlx::migrate::Migrator {
        match self {
            Self::Primary => &PRIMARY,
            Self::Filelists => &FILELISTS,
            Self::Other => &OTHER,
        }
    }
}

/// Connection pool for one metadata index.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    kind: IndexKind,
}

impl Database {
    async fn new(kind: IndexKind, options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool, kind };
        db.migrate().await?;
        Ok(db)
    }

    /// Create a fresh primary index at the given path.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_index(IndexKind::Primary, path).await
    }

    /// Create a fresh index of `kind` at the given path.
    ///
    /// Every run is a full rebuild: an existing file at `path` is removed
    /// first, and missing parent directories are created.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn create_index(kind: IndexKind, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Database)?;
        }
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!("removed previous index"),
            Err(e) if e.kind() == IoErrorKind::NotFound => {},
            Err(e) => return Err(e).or_raise(|| ErrorKind::Database),
        }
        Self::connect_index(kind, path).await
    }

    /// Connect to the primary index at the given path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_index(IndexKind::Primary, path).await
    }

    pub async fn connect_index(kind: IndexKind, path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::base_options().filename(path.as_ref()).create_if_missing(true);
        Self::new(kind, options).await
    }

    /// Connect to an in-memory primary index, used for dry runs and tests.
    ///
    /// Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::connect_in_memory_index(IndexKind::Primary).await
    }

    pub async fn connect_in_memory_index(kind: IndexKind) -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        Self::new(kind, options).await
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // The index is published as a single file, so no WAL sidecars.
            .journal_mode(SqliteJournalMode::Delete)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_millis(1500))
            .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::None)
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA locking_mode = EXCLUSIVE;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    #[instrument("performing database migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        self.kind.migrator().run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    ///
    /// This waits for all connections to be returned to the pool and then
    /// closes them. After calling this, the Database instance should not
    /// be used.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
