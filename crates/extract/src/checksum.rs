//! Whole-file content checksums.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sha2::{Digest, Sha256, Sha512};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs::File;
use std::io::{ErrorKind as IoErrorKind, Read, Result as IoResult};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

/// Files are streamed through the hasher in chunks of this size, regardless
/// of how large the package is.
const BUFFER_SIZE: usize = 64 * 1024;

/// A supported checksum algorithm.
///
/// The algorithm travels alongside every digest (see [`Checksum`]) so that
/// the index records which algorithm produced it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ChecksumKind {
    #[default]
    Sha256,
    Sha512,
}
impl ChecksumKind {
    /// Returns the short name used in the index `checksum_type` column.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the hex-encoded digest.
    #[must_use]
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Streams everything from `reader` through this algorithm.
    ///
    /// # Examples
    ///
    /// ```
    /// use rpmindex_extract::checksum::ChecksumKind;
    ///
    /// let checksum = ChecksumKind::Sha256.compute(&b"abc"[..]).unwrap();
    /// assert_eq!(checksum.digest, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    /// ```
    pub fn compute(&self, reader: impl Read) -> IoResult<Checksum> {
        let digest = match self {
            Self::Sha256 => stream::<Sha256>(reader)?,
            Self::Sha512 => stream::<Sha512>(reader)?,
        };
        Ok(Checksum { kind: *self, digest })
    }
}
impl Display for ChecksumKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
impl FromStr for ChecksumKind {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => exn::bail!(ErrorKind::ParseError {
                field: "checksum",
                value: other.to_string(),
            }),
        }
    }
}

/// A lowercase hex digest tagged with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    pub kind: ChecksumKind,
    pub digest: String,
}
impl Display for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.kind, self.digest)
    }
}

fn stream<D: Digest>(mut reader: impl Read) -> IoResult<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Checksums the entire contents of the file at `path`.
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn checksum_file(path: impl AsRef<Path>, kind: ChecksumKind) -> Result<Checksum> {
    let file = File::open(path.as_ref()).or_raise(|| ErrorKind::Checksum)?;
    kind.compute(file).or_raise(|| ErrorKind::Checksum)
}
