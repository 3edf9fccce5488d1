use crate::checksum::Checksum;
use crate::range::HeaderRange;
use std::path::PathBuf;
use time::UtcDateTime;

/// Metadata describing a single package file, extracted from its header and
/// the file itself.
///
/// Records are built atomically by the [`Extractor`](crate::Extractor) and
/// never modified afterwards. The checksum digest doubles as the package's
/// identifier in the index (`pkgId`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    /// Absolute path of the package file.
    pub path: PathBuf,
    /// Checksum of the entire file.
    pub checksum: Checksum,
    pub modified: UtcDateTime,
    /// File size in bytes.
    pub size: u64,
    pub header_range: HeaderRange,

    pub name: String,
    pub arch: String,
    pub version: String,
    /// Always a numeric string; `"0"` when the header has no epoch.
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

    pub build_time: UtcDateTime,
    /// Total size of the installed files.
    pub installed_size: u64,
    /// Size of the uncompressed payload archive.
    pub archive_size: u64,
}
impl AsRef<PackageRecord> for PackageRecord {
    fn as_ref(&self) -> &PackageRecord {
        self
    }
}
impl PackageRecord {
    /// Identifier of the package in the index.
    pub fn pkg_id(&self) -> &str {
        &self.checksum.digest
    }

    /// Modification time in seconds since the Unix epoch.
    pub fn file_time(&self) -> i64 {
        self.modified.unix_timestamp()
    }

    /// `name-epoch:version-release.arch`
    pub fn nevra(&self) -> String {
        format!("{}-{}:{}-{}.{}", self.name, self.epoch, self.version, self.release, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumKind;

    fn record() -> PackageRecord {
        PackageRecord {
            path: PathBuf::from("/srv/repo/bash-5.2.26-3.fc40.x86_64.rpm"),
            checksum: Checksum {
                kind: ChecksumKind::Sha256,
                digest: "ab".repeat(32),
            },
            modified: UtcDateTime::from_unix_timestamp(1_712_000_000).unwrap(),
            size: 1_900_000,
            header_range: HeaderRange::new(4504, 62000),
            name: "bash".into(),
            arch: "x86_64".into(),
            version: "5.2.26".into(),
            epoch: "0".into(),
            release: "3.fc40".into(),
            summary: "The GNU Bourne Again shell".into(),
            description: "The GNU Bourne Again shell (Bash) is a shell and command language interpreter.".into(),
            url: Some("https://www.gnu.org/software/bash".into()),
            license: Some("GPL-3.0-or-later".into()),
            vendor: None,
            group: None,
            build_host: None,
            source_rpm: Some("bash-5.2.26-3.fc40.src.rpm".into()),
            packager: None,
            build_time: UtcDateTime::from_unix_timestamp(1_706_000_000).unwrap(),
            installed_size: 8_100_000,
            archive_size: 8_200_000,
        }
    }

    #[test]
    fn test_identifiers() {
        let record = record();
        assert_eq!(record.pkg_id(), "ab".repeat(32));
        assert_eq!(record.file_time(), 1_712_000_000);
        assert_eq!(record.nevra(), "bash-0:5.2.26-3.fc40.x86_64");
    }
}
