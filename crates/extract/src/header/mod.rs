//! Package header access.
//!
//! [`Decoder`] opens a package container and hands back a [`PackageHeader`]
//! handle. Handles are released when dropped. The production implementation
//! is [`NativeDecoder`]; tests use the mock decoder behind the `mock` feature.

pub(crate) mod blob;
pub(crate) mod native;

use crate::error::{Error, ErrorKind, Result};
use crate::range::HeaderRange;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

pub use self::native::{NativeDecoder, NativeHeader};

/// A named metadata field inside the package header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Name,
    Arch,
    Version,
    Epoch,
    Release,
    Summary,
    Description,
    Url,
    BuildTime,
    License,
    Vendor,
    Group,
    BuildHost,
    SourceRpm,
    Packager,
    Size,
    ArchiveSize,
}
impl Tag {
    pub const ALL: [Tag; 17] = [
        Self::Name,
        Self::Arch,
        Self::Version,
        Self::Epoch,
        Self::Release,
        Self::Summary,
        Self::Description,
        Self::Url,
        Self::BuildTime,
        Self::License,
        Self::Vendor,
        Self::Group,
        Self::BuildHost,
        Self::SourceRpm,
        Self::Packager,
        Self::Size,
        Self::ArchiveSize,
    ];

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Arch => "arch",
            Self::Version => "version",
            Self::Epoch => "epoch",
            Self::Release => "release",
            Self::Summary => "summary",
            Self::Description => "description",
            Self::Url => "url",
            Self::BuildTime => "buildtime",
            Self::License => "license",
            Self::Vendor => "vendor",
            Self::Group => "group",
            Self::BuildHost => "buildhost",
            Self::SourceRpm => "sourcerpm",
            Self::Packager => "packager",
            Self::Size => "size",
            Self::ArchiveSize => "archivesize",
        }
    }

    /// Numeric tag identifiers in the main header, most preferred first.
    pub(crate) fn ids(&self) -> &'static [u32] {
        match self {
            Self::Name => &[1000],
            Self::Version => &[1001],
            Self::Release => &[1002],
            Self::Epoch => &[1003],
            Self::Summary => &[1004],
            Self::Description => &[1005],
            Self::BuildTime => &[1006],
            Self::BuildHost => &[1007],
            Self::Size => &[5009, 1009],
            Self::Vendor => &[1011],
            Self::License => &[1014],
            Self::Packager => &[1015],
            Self::Group => &[1016],
            Self::Url => &[1020],
            Self::Arch => &[1022],
            Self::SourceRpm => &[1044],
            Self::ArchiveSize => &[271, 1046],
        }
    }

    /// Numeric tag identifiers consulted in the signature header when the
    /// main header has none of [`ids`](Self::ids).
    pub(crate) fn signature_ids(&self) -> &'static [u32] {
        match self {
            Self::ArchiveSize => &[271, 1007],
            _ => &[],
        }
    }
}
impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
impl FromStr for Tag {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match Self::ALL.into_iter().find(|tag| tag.as_str() == lower) {
            Some(tag) => Ok(tag),
            None => exn::bail!(ErrorKind::ParseError {
                field: "tag",
                value: s.to_string(),
            }),
        }
    }
}

/// Opens package containers.
///
/// Implementations must be shareable between extraction workers; each
/// worker opens its own [`Handle`](Self::Handle) per file.
pub trait Decoder: Send + Sync {
    type Handle: PackageHeader;

    fn open(&self, path: &Path) -> Result<Self::Handle>;
}

/// Read access to the header of one open package.
pub trait PackageHeader {
    /// Returns the first string value of `tag`, or `None` when absent.
    ///
    /// Numeric tags are rendered in decimal.
    fn get_string(&self, tag: Tag) -> Result<Option<String>>;

    /// Returns the first numeric value of `tag`, or `None` when absent.
    fn get_number(&self, tag: Tag) -> Result<Option<u64>>;

    /// Byte range of the metadata header. Computed once per handle.
    fn header_range(&mut self) -> Result<HeaderRange>;
}
