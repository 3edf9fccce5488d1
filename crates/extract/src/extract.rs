//! Package metadata extraction.

use crate::checksum::{ChecksumKind, checksum_file};
use crate::error::{ErrorKind, Result};
use crate::header::{Decoder, PackageHeader, Tag};
use crate::models::PackageRecord;
use exn::{OptionExt, ResultExt};
use std::fs;
use std::path::Path;
use time::UtcDateTime;
use tracing::instrument;

/// Domain convention for packages that carry no epoch.
pub const DEFAULT_EPOCH: &str = "0";

/// Builds a [`PackageRecord`] for each package file it is given.
///
/// An extractor owns its decoder and is safe to share between threads; every
/// call to [`extract`](Self::extract) opens its own header handle and drops
/// it before returning, whatever the outcome.
#[derive(Debug)]
pub struct Extractor<D> {
    decoder: D,
    checksum: ChecksumKind,
}
impl<D: Decoder> Extractor<D> {
    pub fn new(decoder: D, checksum: ChecksumKind) -> Self {
        Self { decoder, checksum }
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn checksum_kind(&self) -> ChecksumKind {
        self.checksum
    }

    /// Extracts the metadata of the package at `path`.
    ///
    /// # Errors
    ///
    /// Every failure is specific to this file. Absent required tags are
    /// reported as [`ErrorKind::MissingTag`]. An optional tag that is present
    /// but undecodable is logged and left unset, and an undecodable epoch
    /// falls back to [`DEFAULT_EPOCH`].
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn extract(&self, path: impl AsRef<Path>) -> Result<PackageRecord> {
        let path = std::path::absolute(path.as_ref()).or_raise(|| ErrorKind::Path)?;
        let metadata = fs::metadata(&path).or_raise(|| ErrorKind::Stat)?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::Stat);
        }
        let size = metadata.len();
        let modified: UtcDateTime = metadata.modified().or_raise(|| ErrorKind::Stat)?.into();

        let checksum = checksum_file(&path, self.checksum)?;

        let mut handle = self.decoder.open(&path).or_raise(|| ErrorKind::Open)?;
        let header_range = handle.header_range().or_raise(|| ErrorKind::HeaderRange)?;
        if !header_range.fits_within(size) {
            exn::bail!(ErrorKind::InvalidHeaderRange(header_range, size));
        }

        let build_time = required_number(&handle, Tag::BuildTime)?;
        let build_time = i64::try_from(build_time)
            .ok()
            .and_then(|seconds| UtcDateTime::from_unix_timestamp(seconds).ok())
            .ok_or_raise(|| ErrorKind::ParseError {
                field: "buildtime",
                value: build_time.to_string(),
            })?;

        let record = PackageRecord {
            checksum,
            modified,
            size,
            header_range,
            name: required_string(&handle, Tag::Name)?,
            arch: required_string(&handle, Tag::Arch)?,
            version: required_string(&handle, Tag::Version)?,
            release: required_string(&handle, Tag::Release)?,
            summary: required_string(&handle, Tag::Summary)?.trim().to_string(),
            description: required_string(&handle, Tag::Description)?.trim().to_string(),
            build_time,
            installed_size: required_number(&handle, Tag::Size)?,
            archive_size: required_number(&handle, Tag::ArchiveSize)?,
            epoch: epoch(&handle)?,
            url: optional_string(&handle, Tag::Url)?,
            license: optional_string(&handle, Tag::License)?,
            vendor: optional_string(&handle, Tag::Vendor)?,
            group: optional_string(&handle, Tag::Group)?,
            build_host: optional_string(&handle, Tag::BuildHost)?,
            source_rpm: optional_string(&handle, Tag::SourceRpm)?,
            packager: optional_string(&handle, Tag::Packager)?,
            path,
        };
        tracing::debug!(nevra = %record.nevra(), "extracted package");
        Ok(record)
    }
}

fn required_string(handle: &impl PackageHeader, tag: Tag) -> Result<String> {
    handle.get_string(tag)?.ok_or_raise(|| ErrorKind::MissingTag(tag))
}

fn required_number(handle: &impl PackageHeader, tag: Tag) -> Result<u64> {
    handle.get_number(tag)?.ok_or_raise(|| ErrorKind::MissingTag(tag))
}

fn optional_string(handle: &impl PackageHeader, tag: Tag) -> Result<Option<String>> {
    let value = match handle.get_string(tag) {
        Ok(value) => value,
        Err(e) if *e == ErrorKind::Malformed(tag) => {
            tracing::warn!(%tag, error = ?e, "ignoring undecodable optional tag");
            None
        },
        Err(e) => return Err(e),
    };
    Ok(value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty()))
}

fn epoch(handle: &impl PackageHeader) -> Result<String> {
    match optional_string(handle, Tag::Epoch)? {
        None => Ok(DEFAULT_EPOCH.to_string()),
        Some(epoch) if epoch.bytes().all(|b| b.is_ascii_digit()) => Ok(epoch),
        Some(epoch) => exn::bail!(ErrorKind::ParseError {
            field: "epoch",
            value: epoch,
        }),
    }
}
