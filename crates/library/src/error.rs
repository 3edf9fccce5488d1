//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Walking the directory tree failed; the whole run is over.
    #[display("unable to walk directory: {}", _0.display())]
    Discovery(#[error(not(source))] PathBuf),
    /// The run was cancelled before it completed.
    #[display("scan of {} was cancelled", _0.display())]
    Cancelled(#[error(not(source))] PathBuf),
    /// A single package could not be extracted.
    #[display("unable to extract package: {}", _0.display())]
    Extraction(#[error(not(source))] PathBuf),
    /// The extraction task for a single package panicked or was aborted.
    #[display("extraction worker failed: {}", _0.display())]
    Worker(#[error(not(source))] PathBuf),
    #[display("metadata sink failed")]
    Sink,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Walk errors are I/O errors; they may not happen twice.
        matches!(self, Self::Discovery(_))
    }

    /// Whether this error only affects a single package, not the run.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::Extraction(_) | Self::Worker(_))
    }
}
