//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use crate::header::Tag;
use crate::range::HeaderRange;
use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// Every variant is fatal for the file being extracted, and only for that file.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The path could not be resolved to an absolute path.
    #[display("unable to resolve path")]
    Path,
    /// The file could not be stat'ed, or is not a regular file.
    #[display("unable to stat file")]
    Stat,
    /// Reading the file contents for the checksum failed.
    #[display("unable to checksum file")]
    Checksum,
    /// The package container could not be opened by the header decoder.
    #[display("unable to open package")]
    Open,
    /// The file does not look like a package container at all.
    #[display("not a package: {_0}")]
    NotAPackage(#[error(not(source))] &'static str),
    /// Reading the lead/signature/header index fields failed.
    #[display("unable to locate header range")]
    HeaderRange,
    /// The computed header range does not fit within the file.
    #[display("header range {_0} exceeds file size {_1}")]
    InvalidHeaderRange(#[error(not(source))] HeaderRange, #[error(not(source))] u64),
    /// A required tag is not present in the package header.
    #[display("missing required tag: {_0}")]
    MissingTag(#[error(not(source))] Tag),
    /// A tag is present but its type or location in the data store is invalid.
    #[display("malformed tag: {_0}")]
    Malformed(#[error(not(source))] Tag),
    /// A value was found but could not be converted.
    #[display("failed to parse field '{field}', found value: {value}")]
    ParseError {
        /// The field that failed to parse.
        field: &'static str,
        /// Details about the parsing failure.
        value: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Only the variants that wrap I/O can change between attempts; a
        // malformed package stays malformed.
        matches!(self, Self::Stat | Self::Checksum | Self::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exn::ResultExt;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::MissingTag(Tag::Name).to_string(), "missing required tag: name");
        assert_eq!(
            ErrorKind::InvalidHeaderRange(HeaderRange::new(192, 2848), 1024).to_string(),
            "header range [192, 2848) exceeds file size 1024"
        );
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Checksum.is_retryable());
        assert!(!ErrorKind::MissingTag(Tag::Arch).is_retryable());
        assert!(!ErrorKind::NotAPackage("bad lead magic").is_retryable());
    }

    #[test]
    fn error_from_io_result() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));
        let err: Result<()> = result.or_raise(|| ErrorKind::Stat);
        assert_eq!(*err.unwrap_err(), ErrorKind::Stat);
    }
}
