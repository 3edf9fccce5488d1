use super::blob::{HeaderBlob, Value};
use super::{Decoder, PackageHeader, Tag};
use crate::error::{ErrorKind, Result};
use crate::range::{HeaderRange, LEAD_SIZE, RangeLocator};
use exn::ResultExt;
use std::fs::File;
use std::io::{self, BufReader, ErrorKind as IoErrorKind, Read};
use std::path::Path;
use tracing::instrument;

pub(crate) const LEAD_MAGIC: [u8; 4] = [0xed, 0xab, 0xee, 0xdb];

/// Pure-Rust decoder for package containers.
///
/// Opening a package reads and validates the lead and both headers; the
/// payload is never read.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDecoder;
impl NativeDecoder {
    pub fn new() -> Self {
        Self
    }
}
impl Decoder for NativeDecoder {
    type Handle = NativeHeader;

    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    fn open(&self, path: &Path) -> Result<NativeHeader> {
        let file = File::open(path).or_raise(|| ErrorKind::Open)?;
        NativeHeader::read(BufReader::new(file))
    }
}

/// An open package: both parsed headers plus the underlying file, kept for
/// header range location.
#[derive(Debug)]
pub struct NativeHeader {
    signature: HeaderBlob,
    main: HeaderBlob,
    locator: RangeLocator<BufReader<File>>,
}
impl NativeHeader {
    fn read(mut reader: BufReader<File>) -> Result<Self> {
        let mut lead = [0u8; LEAD_SIZE as usize];
        match reader.read_exact(&mut lead) {
            Err(e) if e.kind() == IoErrorKind::UnexpectedEof => exn::bail!(ErrorKind::NotAPackage("truncated lead")),
            other => other.or_raise(|| ErrorKind::Open)?,
        }
        if lead[..4] != LEAD_MAGIC {
            exn::bail!(ErrorKind::NotAPackage("bad lead magic"));
        }
        let signature = HeaderBlob::read(&mut reader)?;
        let padding = (8 - signature.len() % 8) % 8;
        io::copy(&mut (&mut reader).take(padding), &mut io::sink()).or_raise(|| ErrorKind::Open)?;
        let main = HeaderBlob::read(&mut reader)?;
        Ok(Self {
            signature,
            main,
            locator: RangeLocator::new(reader),
        })
    }

    fn lookup(&self, tag: Tag) -> Result<Option<Value>> {
        match self.main.lookup(tag.ids(), tag)? {
            Some(value) => Ok(Some(value)),
            None => self.signature.lookup(tag.signature_ids(), tag),
        }
    }
}
impl PackageHeader for NativeHeader {
    fn get_string(&self, tag: Tag) -> Result<Option<String>> {
        Ok(self.lookup(tag)?.map(|value| match value {
            Value::Str(s) => s,
            Value::Number(n) => n.to_string(),
        }))
    }

    fn get_number(&self, tag: Tag) -> Result<Option<u64>> {
        match self.lookup(tag)? {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(Some(n)),
            Some(Value::Str(_)) => exn::bail!(ErrorKind::Malformed(tag)),
        }
    }

    fn header_range(&mut self) -> Result<HeaderRange> {
        self.locator.locate().or_raise(|| ErrorKind::HeaderRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::PackageBuilder;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_reads_package_fields() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = PackageBuilder::new("bash", "5.2.26", "3.fc40", "x86_64")
            .epoch(1)
            .summary("The GNU Bourne Again shell")
            .url("https://www.gnu.org/software/bash")
            .installed_size(8_000_000)
            .build();
        let path = write(&dir, "bash.rpm", &bytes);
        let mut header = NativeDecoder.open(&path).unwrap();
        assert_eq!(header.get_string(Tag::Name).unwrap().as_deref(), Some("bash"));
        assert_eq!(header.get_string(Tag::Version).unwrap().as_deref(), Some("5.2.26"));
        assert_eq!(header.get_string(Tag::Arch).unwrap().as_deref(), Some("x86_64"));
        assert_eq!(header.get_string(Tag::Summary).unwrap().as_deref(), Some("The GNU Bourne Again shell"));
        assert_eq!(header.get_string(Tag::Epoch).unwrap().as_deref(), Some("1"));
        assert_eq!(header.get_number(Tag::Size).unwrap(), Some(8_000_000));
        assert_eq!(header.get_string(Tag::Vendor).unwrap(), None);
        let range = header.header_range().unwrap();
        assert!(range.fits_within(bytes.len() as u64));
        assert_eq!(range.start % 8, 0);
    }

    #[test]
    fn test_long_size_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = PackageBuilder::new("big", "1", "1", "noarch").installed_size(5_000_000_000).build();
        let path = write(&dir, "big.rpm", &bytes);
        let header = NativeDecoder.open(&path).unwrap();
        assert_eq!(header.get_number(Tag::Size).unwrap(), Some(5_000_000_000));
    }

    #[test]
    fn test_archive_size_falls_back_to_signature() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = PackageBuilder::new("sig", "1", "1", "noarch").signature_payload_size(4242).build();
        let path = write(&dir, "sig.rpm", &bytes);
        let header = NativeDecoder.open(&path).unwrap();
        assert_eq!(header.get_number(Tag::ArchiveSize).unwrap(), Some(4242));
    }

    #[test]
    fn test_number_from_string_tag_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = PackageBuilder::new("pkg", "1", "1", "noarch").build();
        let path = write(&dir, "pkg.rpm", &bytes);
        let header = NativeDecoder.open(&path).unwrap();
        assert_eq!(*header.get_number(Tag::Name).unwrap_err(), ErrorKind::Malformed(Tag::Name));
    }

    #[test]
    fn test_bad_lead_magic() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = PackageBuilder::new("pkg", "1", "1", "noarch").build();
        bytes[0] = 0x00;
        let path = write(&dir, "pkg.rpm", &bytes);
        let err = NativeDecoder.open(&path).unwrap_err();
        assert_eq!(*err, ErrorKind::NotAPackage("bad lead magic"));
    }

    #[test]
    fn test_truncated_lead() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "short.rpm", &LEAD_MAGIC);
        let err = NativeDecoder.open(&path).unwrap_err();
        assert_eq!(*err, ErrorKind::NotAPackage("truncated lead"));
    }

    #[test]
    fn test_not_a_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "text.rpm", &[b'x'; 512]);
        assert!(matches!(*NativeDecoder.open(&path).unwrap_err(), ErrorKind::NotAPackage(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = NativeDecoder.open(&dir.path().join("missing.rpm")).unwrap_err();
        assert_eq!(*err, ErrorKind::Open);
    }
}
