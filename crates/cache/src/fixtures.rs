use rpmindex_extract::models::PackageRecord;
use rpmindex_extract::{Checksum, ChecksumKind, HeaderRange};
use std::path::PathBuf;
use time::UtcDateTime;

/// A fully-populated record whose digest is `digest_byte` repeated.
pub(crate) fn record(name: &str, digest_byte: &str) -> PackageRecord {
    PackageRecord {
        path: PathBuf::from(format!("/srv/repo/Packages/{name}-1.0-1.x86_64.rpm")),
        checksum: Checksum {
            kind: ChecksumKind::Sha256,
            digest: digest_byte.repeat(32),
        },
        modified: UtcDateTime::from_unix_timestamp(1_712_000_000).unwrap(),
        size: 1_900_000,
        header_range: HeaderRange::new(4504, 62000),
        name: name.to_string(),
        arch: "x86_64".into(),
        version: "1.0".into(),
        epoch: "0".into(),
        release: "1".into(),
        summary: format!("{name} summary"),
        description: format!("{name} description"),
        url: Some(format!("https://example.org/{name}")),
        license: Some("MIT".into()),
        vendor: None,
        group: Some("Unspecified".into()),
        build_host: Some("builder.example.org".into()),
        source_rpm: Some(format!("{name}-1.0-1.src.rpm")),
        packager: None,
        build_time: UtcDateTime::from_unix_timestamp(1_706_000_000).unwrap(),
        installed_size: 8_100_000,
        archive_size: 8_200_000,
    }
}
