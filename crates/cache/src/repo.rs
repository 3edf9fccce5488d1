//! Repository for the `packages` table of the primary index.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{IndexedPackage, NewPackageRow, PackageRow};
use exn::ResultExt;
use rpmindex_extract::models::PackageRecord;
use sqlx::SqlitePool;
use tracing::instrument;

/// Reads and writes package rows.
///
/// In dry-run mode every write is skipped and reported as such; reads still
/// go to the database.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: false }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert one package row.
    ///
    /// Returns the assigned `pkgKey`, or `None` when running dry.
    #[instrument(skip(self, record), fields(pkg_id = record.pkg_id()))]
    pub async fn insert(&self, record: &PackageRecord, location_href: &str) -> Result<Option<i64>> {
        let row = NewPackageRow::new(record, location_href)?;
        if self.dry_run {
            return Ok(None);
        }
        let result = sqlx::query(include_str!("../queries/insert_package.sql"))
            .bind(row.pkg_id)
            .bind(row.name)
            .bind(row.arch)
            .bind(row.version)
            .bind(row.epoch)
            .bind(row.release)
            .bind(row.summary)
            .bind(row.description)
            .bind(row.url)
            .bind(row.time_file)
            .bind(row.time_build)
            .bind(row.rpm_license)
            .bind(row.rpm_vendor)
            .bind(row.rpm_group)
            .bind(row.rpm_buildhost)
            .bind(row.rpm_sourcerpm)
            .bind(row.rpm_header_start)
            .bind(row.rpm_header_end)
            .bind(row.rpm_packager)
            .bind(row.size_package)
            .bind(row.size_installed)
            .bind(row.size_archive)
            .bind(row.location_href)
            .bind(row.checksum_type)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Some(result.last_insert_rowid()))
    }

    // =========================================================================
    // Query
    // =========================================================================

    pub async fn get_by_pkg_id(&self, pkg_id: impl AsRef<str>) -> Result<Option<IndexedPackage>> {
        let row: Option<PackageRow> = sqlx::query_as(include_str!("../queries/get_by_pkg_id.sql"))
            .bind(pkg_id.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(|r| r.try_into()).transpose()
    }

    /// All packages, in insertion order.
    pub async fn list(&self) -> Result<Vec<IndexedPackage>> {
        let rows: Vec<PackageRow> = sqlx::query_as(include_str!("../queries/list_packages.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_packages.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("package count"))
    }

    /// The schema version recorded in `db_info`.
    pub async fn db_version(&self) -> Result<Option<i64>> {
        sqlx::query_scalar(include_str!("../queries/db_version.sql"))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }
}

/// Mirrors primary `pkgKey`/`pkgId` pairs into the filelists and other
/// indexes, whose own tables reference packages by key.
#[derive(Debug, Clone)]
pub struct KeyRepository {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for KeyRepository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: false }
    }
}
impl KeyRepository {
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    /// Record that `key` identifies the package `pkg_id`.
    ///
    /// Returns `false` when running dry.
    #[instrument(skip(self, pkg_id), fields(pkg_id = pkg_id.as_ref()))]
    pub async fn insert(&self, key: i64, pkg_id: impl AsRef<str>) -> Result<bool> {
        if self.dry_run {
            return Ok(false);
        }
        sqlx::query(include_str!("../queries/insert_package_key.sql"))
            .bind(key)
            .bind(pkg_id.as_ref())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(true)
    }

    pub async fn get_key(&self, pkg_id: impl AsRef<str>) -> Result<Option<i64>> {
        sqlx::query_scalar(include_str!("../queries/get_key_by_pkg_id.sql"))
            .bind(pkg_id.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_packages.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("package count"))
    }

    pub async fn db_version(&self) -> Result<Option<i64>> {
        sqlx::query_scalar(include_str!("../queries/db_version.sql"))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }
}
