//! Package container parsing and metadata extraction.
//!
//! The [`Extractor`] combines the [`checksum`], [`range`] and [`header`]
//! modules into one [`PackageRecord`](models::PackageRecord) per package file.

pub mod checksum;
pub mod error;
mod extract;
pub mod header;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod range;

pub use crate::checksum::{Checksum, ChecksumKind};
pub use crate::extract::{DEFAULT_EPOCH, Extractor};
pub use crate::header::{Decoder, NativeDecoder, PackageHeader, Tag};
pub use crate::range::HeaderRange;
