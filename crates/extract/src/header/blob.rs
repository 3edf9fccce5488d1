//! Header structure parsing.
//!
//! Both the signature and the main header use the same structure: a 16-byte
//! preamble, `count` index entries of 16 bytes each, then a data store that
//! the entries point into.

use super::Tag;
use crate::error::{ErrorKind, Result};
use crate::range::{HEADER_PREAMBLE_SIZE, INDEX_ENTRY_SIZE};
use exn::{OptionExt, ResultExt};
use std::io::{ErrorKind as IoErrorKind, Read};

pub(crate) const HEADER_MAGIC: [u8; 4] = [0x8e, 0xad, 0xe8, 0x01];
/// Upper bound on index entries accepted from a single header.
const MAX_INDEX_ENTRIES: u32 = 0xFFFF;
/// Upper bound on the data store accepted from a single header.
const MAX_DATA_SIZE: u32 = 256 * 1024 * 1024;

pub(crate) const TYPE_NULL: u32 = 0;
pub(crate) const TYPE_CHAR: u32 = 1;
pub(crate) const TYPE_INT8: u32 = 2;
pub(crate) const TYPE_INT16: u32 = 3;
pub(crate) const TYPE_INT32: u32 = 4;
pub(crate) const TYPE_INT64: u32 = 5;
pub(crate) const TYPE_STRING: u32 = 6;
pub(crate) const TYPE_BIN: u32 = 7;
pub(crate) const TYPE_STRING_ARRAY: u32 = 8;
pub(crate) const TYPE_I18NSTRING: u32 = 9;

/// A decoded tag value. Only the first element of array values is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Value {
    Str(String),
    Number(u64),
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    tag: u32,
    kind: u32,
    offset: u32,
    count: u32,
}

#[derive(Debug, Default)]
pub(crate) struct HeaderBlob {
    entries: Vec<IndexEntry>,
    data: Vec<u8>,
}

fn be_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(buf)
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    match reader.read_exact(buf) {
        Err(e) if e.kind() == IoErrorKind::UnexpectedEof => exn::bail!(ErrorKind::NotAPackage("truncated header")),
        other => other.or_raise(|| ErrorKind::Open),
    }
}

impl HeaderBlob {
    /// Reads one header structure, starting at its magic.
    pub(crate) fn read(reader: &mut impl Read) -> Result<Self> {
        let mut preamble = [0u8; 16];
        read_exact(reader, &mut preamble)?;
        if preamble[..4] != HEADER_MAGIC {
            exn::bail!(ErrorKind::NotAPackage("bad header magic"));
        }
        let count = be_u32(&preamble[8..12]);
        let size = be_u32(&preamble[12..16]);
        if count > MAX_INDEX_ENTRIES {
            exn::bail!(ErrorKind::NotAPackage("header index too large"));
        }
        if size > MAX_DATA_SIZE {
            exn::bail!(ErrorKind::NotAPackage("header data store too large"));
        }

        // Both values are bounded above, so these fit comfortably in usize.
        let mut index = vec![0u8; count as usize * INDEX_ENTRY_SIZE as usize];
        read_exact(reader, &mut index)?;
        let entries = index
            .chunks_exact(INDEX_ENTRY_SIZE as usize)
            .map(|chunk| IndexEntry {
                tag: be_u32(&chunk[0..4]),
                kind: be_u32(&chunk[4..8]),
                offset: be_u32(&chunk[8..12]),
                count: be_u32(&chunk[12..16]),
            })
            .collect();
        let mut data = vec![0u8; size as usize];
        read_exact(reader, &mut data)?;
        Ok(Self { entries, data })
    }

    /// Total bytes occupied on disk, preamble included.
    pub(crate) fn len(&self) -> u64 {
        HEADER_PREAMBLE_SIZE + self.entries.len() as u64 * INDEX_ENTRY_SIZE + self.data.len() as u64
    }

    #[cfg(test)]
    fn contains(&self, id: u32) -> bool {
        self.entries.iter().any(|entry| entry.tag == id)
    }

    /// Decodes the first of `ids` present in this header. `tag` is only
    /// used to label errors.
    pub(crate) fn lookup(&self, ids: &[u32], tag: Tag) -> Result<Option<Value>> {
        let Some(entry) = ids.iter().find_map(|id| self.entries.iter().find(|entry| entry.tag == *id)) else {
            return Ok(None);
        };
        self.decode(entry).ok_or_raise(|| ErrorKind::Malformed(tag)).map(Some)
    }

    fn decode(&self, entry: &IndexEntry) -> Option<Value> {
        if entry.count == 0 {
            return None;
        }
        let offset = usize::try_from(entry.offset).ok()?;
        let tail = self.data.get(offset..)?;
        let number = |width: usize| -> Option<u64> {
            let bytes = tail.get(..width)?;
            Some(bytes.iter().fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
        };
        match entry.kind {
            TYPE_STRING | TYPE_I18NSTRING | TYPE_STRING_ARRAY => {
                let end = memchr::memchr(0, tail)?;
                Some(Value::Str(String::from_utf8_lossy(&tail[..end]).into_owned()))
            },
            TYPE_INT8 => number(1).map(Value::Number),
            TYPE_INT16 => number(2).map(Value::Number),
            TYPE_INT32 => number(4).map(Value::Number),
            TYPE_INT64 => number(8).map(Value::Number),
            // Never used by the fields read here.
            TYPE_NULL | TYPE_CHAR | TYPE_BIN => None,
            _ => None,
        }
    }
}

/// Serializes header structures. Used to produce package fixtures.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Default)]
pub(crate) struct BlobWriter {
    index: Vec<u8>,
    data: Vec<u8>,
    count: u32,
}
#[cfg(any(test, feature = "mock"))]
impl BlobWriter {
    fn push(&mut self, tag: u32, kind: u32, count: u32, align: usize, bytes: &[u8]) -> &mut Self {
        while self.data.len() % align != 0 {
            self.data.push(0);
        }
        let offset = u32::try_from(self.data.len()).unwrap_or(u32::MAX);
        for field in [tag, kind, offset, count] {
            self.index.extend_from_slice(&field.to_be_bytes());
        }
        self.data.extend_from_slice(bytes);
        self.count += 1;
        self
    }

    pub(crate) fn string(&mut self, tag: u32, value: &str) -> &mut Self {
        let bytes = [value.as_bytes(), &[0]].concat();
        self.push(tag, TYPE_STRING, 1, 1, &bytes)
    }

    pub(crate) fn i18n_string(&mut self, tag: u32, value: &str) -> &mut Self {
        let bytes = [value.as_bytes(), &[0]].concat();
        self.push(tag, TYPE_I18NSTRING, 1, 1, &bytes)
    }

    pub(crate) fn string_array(&mut self, tag: u32, values: &[&str]) -> &mut Self {
        let bytes: Vec<u8> = values.iter().flat_map(|value| value.bytes().chain([0])).collect();
        let count = u32::try_from(values.len()).unwrap_or(u32::MAX);
        self.push(tag, TYPE_STRING_ARRAY, count, 1, &bytes)
    }

    #[cfg(test)]
    fn int16(&mut self, tag: u32, value: u16) -> &mut Self {
        self.push(tag, TYPE_INT16, 1, 2, &value.to_be_bytes())
    }

    pub(crate) fn int32(&mut self, tag: u32, value: u32) -> &mut Self {
        self.push(tag, TYPE_INT32, 1, 4, &value.to_be_bytes())
    }

    pub(crate) fn int64(&mut self, tag: u32, value: u64) -> &mut Self {
        self.push(tag, TYPE_INT64, 1, 8, &value.to_be_bytes())
    }

    pub(crate) fn bin(&mut self, tag: u32, value: &[u8]) -> &mut Self {
        let count = u32::try_from(value.len()).unwrap_or(u32::MAX);
        self.push(tag, TYPE_BIN, count, 1, value)
    }

    /// Adds an entry with arbitrary fields and no data, for malformed fixtures.
    pub(crate) fn raw(&mut self, tag: u32, kind: u32, offset: u32, count: u32) -> &mut Self {
        for field in [tag, kind, offset, count] {
            self.index.extend_from_slice(&field.to_be_bytes());
        }
        self.count += 1;
        self
    }

    pub(crate) fn finish(&self) -> Vec<u8> {
        let size = u32::try_from(self.data.len()).unwrap_or(u32::MAX);
        let mut out = Vec::with_capacity(16 + self.index.len() + self.data.len());
        out.extend_from_slice(&HEADER_MAGIC);
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&self.count.to_be_bytes());
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(&self.index);
        out.extend_from_slice(&self.data);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    fn parse(writer: &BlobWriter) -> HeaderBlob {
        HeaderBlob::read(&mut Cursor::new(writer.finish())).unwrap()
    }

    #[test]
    fn test_strings_and_numbers() {
        let mut writer = BlobWriter::default();
        writer
            .string(1000, "bash")
            .i18n_string(1004, "The GNU Bourne Again shell")
            .string_array(1016, &["System Environment/Shells", "ignored"])
            .int16(9000, 513)
            .int32(1006, 1_700_000_000)
            .int64(5009, 6_000_000_000);
        let blob = parse(&writer);
        assert_eq!(blob.lookup(&[1000], Tag::Name).unwrap(), Some(Value::Str("bash".into())));
        assert_eq!(
            blob.lookup(&[1004], Tag::Summary).unwrap(),
            Some(Value::Str("The GNU Bourne Again shell".into()))
        );
        assert_eq!(
            blob.lookup(&[1016], Tag::Group).unwrap(),
            Some(Value::Str("System Environment/Shells".into()))
        );
        assert_eq!(blob.lookup(&[9000], Tag::Size).unwrap(), Some(Value::Number(513)));
        assert_eq!(blob.lookup(&[1006], Tag::BuildTime).unwrap(), Some(Value::Number(1_700_000_000)));
        assert_eq!(blob.lookup(&[5009, 1009], Tag::Size).unwrap(), Some(Value::Number(6_000_000_000)));
        assert_eq!(blob.len(), writer.finish().len() as u64);
    }

    #[test]
    fn test_first_present_id_wins() {
        let mut writer = BlobWriter::default();
        writer.int32(1009, 10).int64(5009, 20);
        let blob = parse(&writer);
        assert_eq!(blob.lookup(&[5009, 1009], Tag::Size).unwrap(), Some(Value::Number(20)));
        assert_eq!(blob.lookup(&[1009, 5009], Tag::Size).unwrap(), Some(Value::Number(10)));
        assert_eq!(blob.lookup(&[1234], Tag::Size).unwrap(), None);
        assert!(blob.contains(1009));
        assert!(!blob.contains(1234));
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut writer = BlobWriter::default();
        writer.push(1011, TYPE_STRING, 1, 1, &[b'A', 0xff, b'B', 0]);
        let blob = parse(&writer);
        assert_eq!(blob.lookup(&[1011], Tag::Vendor).unwrap(), Some(Value::Str("A\u{fffd}B".into())));
    }

    #[rstest]
    #[case::offset_out_of_bounds(TYPE_STRING, 4096, 1)]
    #[case::zero_count(TYPE_INT32, 0, 0)]
    #[case::binary(TYPE_BIN, 0, 4)]
    #[case::null(TYPE_NULL, 0, 1)]
    #[case::unknown_type(42, 0, 1)]
    #[case::number_runs_past_end(TYPE_INT64, 2, 1)]
    fn test_malformed_entries(#[case] kind: u32, #[case] offset: u32, #[case] count: u32) {
        let mut writer = BlobWriter::default();
        writer.string(1000, "abc").raw(1011, kind, offset, count);
        let blob = parse(&writer);
        let err = blob.lookup(&[1011], Tag::Vendor).unwrap_err();
        assert_eq!(*err, ErrorKind::Malformed(Tag::Vendor));
    }

    #[test]
    fn test_unterminated_string_is_malformed() {
        let mut writer = BlobWriter::default();
        writer.push(1000, TYPE_STRING, 1, 1, b"abc");
        let blob = parse(&writer);
        assert_eq!(*blob.lookup(&[1000], Tag::Name).unwrap_err(), ErrorKind::Malformed(Tag::Name));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = BlobWriter::default().finish();
        bytes[0] = 0;
        let err = HeaderBlob::read(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(*err, ErrorKind::NotAPackage("bad header magic"));
    }

    #[test]
    fn test_truncated_data_store() {
        let mut writer = BlobWriter::default();
        writer.string(1000, "truncated");
        let mut bytes = writer.finish();
        bytes.truncate(bytes.len() - 3);
        let err = HeaderBlob::read(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(*err, ErrorKind::NotAPackage("truncated header"));
    }

    #[rstest]
    #[case::index(0x0001_0000, 0, "header index too large")]
    #[case::data(0, 256 * 1024 * 1024 + 1, "header data store too large")]
    fn test_bounds(#[case] count: u32, #[case] size: u32, #[case] reason: &'static str) {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&HEADER_MAGIC);
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend_from_slice(&count.to_be_bytes());
        bytes.extend_from_slice(&size.to_be_bytes());
        let err = HeaderBlob::read(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(*err, ErrorKind::NotAPackage(reason));
    }
}
