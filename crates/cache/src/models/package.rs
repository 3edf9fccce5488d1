use crate::error::{Error, ErrorKind};
use exn::{OptionExt, ResultExt};
use rpmindex_extract::models::PackageRecord;
use rpmindex_extract::{ChecksumKind, HeaderRange};
use time::UtcDateTime;

/// Column values of one `packages` row, as written.
#[derive(Debug)]
pub(crate) struct NewPackageRow {
    pub(crate) pkg_id: String,
    pub(crate) name: String,
    pub(crate) arch: String,
    pub(crate) version: String,
    pub(crate) epoch: String,
    pub(crate) release: String,
    pub(crate) summary: String,
    pub(crate) description: String,
    pub(crate) url: Option<String>,
    pub(crate) time_file: i64,
    pub(crate) time_build: i64,
    pub(crate) rpm_license: Option<String>,
    pub(crate) rpm_vendor: Option<String>,
    pub(crate) rpm_group: Option<String>,
    pub(crate) rpm_buildhost: Option<String>,
    pub(crate) rpm_sourcerpm: Option<String>,
    pub(crate) rpm_header_start: i64,
    pub(crate) rpm_header_end: i64,
    pub(crate) rpm_packager: Option<String>,
    pub(crate) size_package: i64,
    pub(crate) size_installed: i64,
    pub(crate) size_archive: i64,
    pub(crate) location_href: String,
    pub(crate) checksum_type: &'static str,
}
impl NewPackageRow {
    pub(crate) fn new(record: &PackageRecord, location_href: &str) -> Result<Self, Error> {
        let int = |value: u64, field: &'static str| i64::try_from(value).or_raise(|| ErrorKind::InvalidData(field));
        Ok(Self {
            pkg_id: record.pkg_id().to_string(),
            name: record.name.clone(),
            arch: record.arch.clone(),
            version: record.version.clone(),
            epoch: record.epoch.clone(),
            release: record.release.clone(),
            summary: record.summary.clone(),
            description: record.description.clone(),
            url: record.url.clone(),
            time_file: record.file_time(),
            time_build: record.build_time.unix_timestamp(),
            rpm_license: record.license.clone(),
            rpm_vendor: record.vendor.clone(),
            rpm_group: record.group.clone(),
            rpm_buildhost: record.build_host.clone(),
            rpm_sourcerpm: record.source_rpm.clone(),
            rpm_header_start: int(record.header_range.start, "header start")?,
            rpm_header_end: int(record.header_range.end, "header end")?,
            rpm_packager: record.packager.clone(),
            size_package: int(record.size, "package size")?,
            size_installed: int(record.installed_size, "installed size")?,
            size_archive: int(record.archive_size, "archive size")?,
            location_href: location_href.to_string(),
            checksum_type: record.checksum.kind.as_str(),
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PackageRow {
    #[sqlx(rename = "pkgKey")]
    pkg_key: i64,
    #[sqlx(rename = "pkgId")]
    pkg_id: Option<String>,
    name: Option<String>,
    arch: Option<String>,
    version: Option<String>,
    epoch: Option<String>,
    release: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    url: Option<String>,
    time_file: Option<i64>,
    time_build: Option<i64>,
    rpm_license: Option<String>,
    rpm_vendor: Option<String>,
    rpm_group: Option<String>,
    rpm_buildhost: Option<String>,
    rpm_sourcerpm: Option<String>,
    rpm_header_start: Option<i64>,
    rpm_header_end: Option<i64>,
    rpm_packager: Option<String>,
    size_package: Option<i64>,
    size_installed: Option<i64>,
    size_archive: Option<i64>,
    location_href: Option<String>,
    checksum_type: Option<String>,
}

/// A package as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedPackage {
    /// `pkgKey`, assigned by the database on insert.
    pub key: i64,
    /// `pkgId`, the checksum digest of the package file.
    pub pkg_id: String,
    pub checksum_type: ChecksumKind,
    pub name: String,
    pub arch: String,
    pub version: String,
    pub epoch: String,
    pub release: String,
    pub summary: String,
    pub description: String,
    pub url: Option<String>,
    pub license: Option<String>,
    pub vendor: Option<String>,
    pub group: Option<String>,
    pub build_host: Option<String>,
    pub source_rpm: Option<String>,
    pub packager: Option<String>,
    pub file_time: UtcDateTime,
    pub build_time: UtcDateTime,
    pub header_range: HeaderRange,
    pub size_package: u64,
    pub size_installed: u64,
    pub size_archive: u64,
    /// Path of the package relative to the repository root.
    pub location_href: String,
}

fn required<T>(value: Option<T>, column: &'static str) -> Result<T, Error> {
    value.ok_or_raise(|| ErrorKind::InvalidData(column))
}

fn unsigned(value: Option<i64>, column: &'static str) -> Result<u64, Error> {
    u64::try_from(required(value, column)?).or_raise(|| ErrorKind::InvalidData(column))
}

fn timestamp(value: Option<i64>, column: &'static str) -> Result<UtcDateTime, Error> {
    UtcDateTime::from_unix_timestamp(required(value, column)?).or_raise(|| ErrorKind::InvalidData(column))
}

impl TryFrom<PackageRow> for IndexedPackage {
    type Error = Error;
    fn try_from(row: PackageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            key: row.pkg_key,
            pkg_id: required(row.pkg_id, "pkgId")?,
            checksum_type: required(row.checksum_type, "checksum_type")?
                .parse::<ChecksumKind>()
                .or_raise(|| ErrorKind::InvalidData("checksum_type"))?,
            name: required(row.name, "name")?,
            arch: required(row.arch, "arch")?,
            version: required(row.version, "version")?,
            epoch: required(row.epoch, "epoch")?,
            release: required(row.release, "release")?,
            summary: required(row.summary, "summary")?,
            description: required(row.description, "description")?,
            url: row.url,
            license: row.rpm_license,
            vendor: row.rpm_vendor,
            group: row.rpm_group,
            build_host: row.rpm_buildhost,
            source_rpm: row.rpm_sourcerpm,
            packager: row.rpm_packager,
            file_time: timestamp(row.time_file, "time_file")?,
            build_time: timestamp(row.time_build, "time_build")?,
            header_range: HeaderRange::new(
                unsigned(row.rpm_header_start, "rpm_header_start")?,
                unsigned(row.rpm_header_end, "rpm_header_end")?,
            ),
            size_package: unsigned(row.size_package, "size_package")?,
            size_installed: unsigned(row.size_installed, "size_installed")?,
            size_archive: unsigned(row.size_archive, "size_archive")?,
            location_href: required(row.location_href, "location_href")?,
        })
    }
}
