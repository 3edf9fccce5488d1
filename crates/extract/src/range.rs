//! Header range location.
//!
//! A package container is laid out as a fixed-size lead, a signature header
//! (padded to an 8-byte boundary), the metadata header, and finally the
//! payload. Both headers share the same preamble:
//!
//! ```text
//! +--------+----------+-------------+-----------+-------------------+------------+
//! | magic  | reserved | index count | data size | index (count*16)  | data store |
//! | 4      | 4        | 4 (BE u32)  | 4 (BE u32)| ...               | ...        |
//! +--------+----------+-------------+-----------+-------------------+------------+
//! ```
//!
//! Downstream tooling byte-slices the metadata header straight out of the
//! file using the range computed here, so the arithmetic must match the
//! createrepo reference exactly. Nothing in this module validates magic
//! numbers; that is the decoder's job.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{Read, Result as IoResult, Seek, SeekFrom};

/// Size of the lead, which precedes the signature header.
pub const LEAD_SIZE: u64 = 96;
/// Size of a single header index entry (tag, type, offset, count).
pub const INDEX_ENTRY_SIZE: u64 = 16;
/// Size of a header preamble (magic, reserved, index count, data size).
pub const HEADER_PREAMBLE_SIZE: u64 = 16;
/// Offset of the header preamble's index count field (skips magic and reserved).
const COUNTS_OFFSET: u64 = 8;
/// The signature header is padded so the metadata header starts 8-byte aligned.
const SIGNATURE_ALIGNMENT: u64 = 8;

/// Byte interval `[start, end)` occupied by the metadata header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeaderRange {
    pub start: u64,
    pub end: u64,
}
impl HeaderRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes occupied by the metadata header.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether the range is non-empty and lies entirely within a file of `size` bytes.
    pub fn fits_within(&self, size: u64) -> bool {
        self.start < self.end && self.end <= size
    }
}
impl Display for HeaderRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

fn read_u32_pair<R: Read + Seek>(reader: &mut R, offset: u64) -> IoResult<(u64, u64)> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    let count = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let size = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    Ok((u64::from(count), u64::from(size)))
}

/// Computes the metadata header range of the container behind `reader`.
///
/// The reader may be positioned anywhere; it is left positioned just after
/// the metadata header's data size field. Seek and read errors are returned
/// unchanged, a file too short to contain either preamble results in
/// [`UnexpectedEof`](std::io::ErrorKind::UnexpectedEof).
///
/// # Examples
///
/// ```
/// use std::io::Cursor;
/// use rpmindex_extract::range::locate_header_range;
///
/// let mut bytes = vec![0u8; 2848];
/// bytes[104..112].copy_from_slice(&[0, 0, 0, 2, 0, 0, 0, 48]);
/// bytes[200..208].copy_from_slice(&[0, 0, 0, 40, 0, 0, 0x07, 0xd0]);
/// let range = locate_header_range(&mut Cursor::new(bytes)).unwrap();
/// assert_eq!((range.start, range.end), (192, 2848));
/// ```
pub fn locate_header_range<R: Read + Seek>(reader: &mut R) -> IoResult<HeaderRange> {
    let (sig_index_count, sig_data_size) = read_u32_pair(reader, LEAD_SIZE + COUNTS_OFFSET)?;
    let sig_size = sig_data_size + sig_index_count * INDEX_ENTRY_SIZE;
    let padding = match sig_size % SIGNATURE_ALIGNMENT {
        0 => 0,
        rem => SIGNATURE_ALIGNMENT - rem,
    };
    let start = LEAD_SIZE + HEADER_PREAMBLE_SIZE + sig_size + padding;

    let (hdr_index_count, hdr_data_size) = read_u32_pair(reader, start + COUNTS_OFFSET)?;
    let hdr_size = hdr_data_size + hdr_index_count * INDEX_ENTRY_SIZE + HEADER_PREAMBLE_SIZE;
    Ok(HeaderRange::new(start, start + hdr_size))
}

/// Caching wrapper around [`locate_header_range`] for a single open handle.
///
/// The first call to [`locate`](Self::locate) reads the file; every
/// subsequent call returns the cached range without touching the reader.
#[derive(Debug)]
pub struct RangeLocator<R> {
    reader: R,
    cached: Option<HeaderRange>,
}
impl<R: Read + Seek> RangeLocator<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, cached: None }
    }

    pub fn locate(&mut self) -> IoResult<HeaderRange> {
        if let Some(range) = self.cached {
            return Ok(range);
        }
        let range = locate_header_range(&mut self.reader)?;
        self.cached = Some(range);
        Ok(range)
    }

    pub fn cached(&self) -> Option<HeaderRange> {
        self.cached
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
