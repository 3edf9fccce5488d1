//! Test doubles and fixture generation.
//!
//! [`PackageBuilder`] writes byte-valid package containers that
//! [`NativeDecoder`](crate::header::NativeDecoder) can read, and
//! [`MockDecoder`] serves canned tag values while still locating the header
//! range from the real file on disk.

use crate::error::{ErrorKind, Result};
use crate::header::blob::{BlobWriter, TYPE_STRING};
use crate::header::native::LEAD_MAGIC;
use crate::header::{Decoder, PackageHeader, Tag};
use crate::range::{HeaderRange, LEAD_SIZE, RangeLocator};
use exn::{OptionExt, ResultExt};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

const SIGTAG_SIZE: u32 = 1000;
const SIGTAG_MD5: u32 = 1004;
const SIGTAG_PAYLOADSIZE: u32 = 1007;

/// Builds the bytes of a package container.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    strings: Vec<(Tag, String)>,
    epoch: Option<u32>,
    build_time: u32,
    installed_size: u64,
    archive_size: Option<u64>,
    signature_payload_size: Option<u32>,
    payload: Vec<u8>,
    omitted: Vec<Tag>,
    malformed: Vec<Tag>,
}
impl PackageBuilder {
    pub fn new(name: &str, version: &str, release: &str, arch: &str) -> Self {
        Self {
            strings: vec![
                (Tag::Name, name.to_string()),
                (Tag::Version, version.to_string()),
                (Tag::Release, release.to_string()),
                (Tag::Arch, arch.to_string()),
                (Tag::Summary, format!("{name} package")),
                (Tag::Description, format!("The {name} package.")),
            ],
            epoch: None,
            build_time: 1_700_000_000,
            installed_size: 4096,
            archive_size: Some(4608),
            signature_payload_size: None,
            payload: vec![0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00],
            omitted: Vec::new(),
            malformed: Vec::new(),
        }
    }

    fn set(mut self, tag: Tag, value: &str) -> Self {
        self.strings.retain(|(t, _)| *t != tag);
        self.strings.push((tag, value.to_string()));
        self
    }

    pub fn summary(self, value: &str) -> Self {
        self.set(Tag::Summary, value)
    }

    pub fn description(self, value: &str) -> Self {
        self.set(Tag::Description, value)
    }

    pub fn url(self, value: &str) -> Self {
        self.set(Tag::Url, value)
    }

    pub fn license(self, value: &str) -> Self {
        self.set(Tag::License, value)
    }

    pub fn vendor(self, value: &str) -> Self {
        self.set(Tag::Vendor, value)
    }

    pub fn group(self, value: &str) -> Self {
        self.set(Tag::Group, value)
    }

    pub fn build_host(self, value: &str) -> Self {
        self.set(Tag::BuildHost, value)
    }

    pub fn source_rpm(self, value: &str) -> Self {
        self.set(Tag::SourceRpm, value)
    }

    pub fn packager(self, value: &str) -> Self {
        self.set(Tag::Packager, value)
    }

    pub fn epoch(mut self, epoch: u32) -> Self {
        self.epoch = Some(epoch);
        self
    }

    pub fn build_time(mut self, seconds: u32) -> Self {
        self.build_time = seconds;
        self
    }

    /// Values above `u32::MAX` are written as `LONGSIZE`.
    pub fn installed_size(mut self, bytes: u64) -> Self {
        self.installed_size = bytes;
        self
    }

    pub fn archive_size(mut self, bytes: u64) -> Self {
        self.archive_size = Some(bytes);
        self
    }

    /// Records the archive size only in the signature header, as older
    /// packages do.
    pub fn signature_payload_size(mut self, bytes: u32) -> Self {
        self.archive_size = None;
        self.signature_payload_size = Some(bytes);
        self
    }

    pub fn payload(mut self, bytes: &[u8]) -> Self {
        self.payload = bytes.to_vec();
        self
    }

    /// Leaves `tag` out of the main header entirely.
    pub fn omit(mut self, tag: Tag) -> Self {
        self.omitted.push(tag);
        self
    }

    /// Writes an index entry for `tag` whose data offset lies outside the
    /// data store.
    pub fn malformed(mut self, tag: Tag) -> Self {
        self.malformed.push(tag);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut main = BlobWriter::default();
        for tag in &self.malformed {
            main.raw(tag.ids()[0], TYPE_STRING, u32::MAX, 1);
        }
        for (tag, value) in &self.strings {
            if self.omitted.contains(tag) || self.malformed.contains(tag) {
                continue;
            }
            let id = tag.ids()[0];
            match tag {
                Tag::Summary | Tag::Description | Tag::Group => main.i18n_string(id, value),
                _ => main.string(id, value),
            };
        }
        if let Some(epoch) = self.epoch.filter(|_| !self.omitted.contains(&Tag::Epoch)) {
            main.int32(1003, epoch);
        }
        if !self.omitted.contains(&Tag::BuildTime) {
            main.int32(1006, self.build_time);
        }
        if !self.omitted.contains(&Tag::Size) {
            match u32::try_from(self.installed_size) {
                Ok(size) => main.int32(1009, size),
                Err(_) => main.int64(5009, self.installed_size),
            };
        }
        if let Some(size) = self.archive_size.filter(|_| !self.omitted.contains(&Tag::ArchiveSize)) {
            match u32::try_from(size) {
                Ok(size) => main.int32(1046, size),
                Err(_) => main.int64(271, size),
            };
        }
        main.string_array(1117, &["placeholder"]);
        let main = main.finish();

        let mut signature = BlobWriter::default();
        let total = u32::try_from(main.len() + self.payload.len()).unwrap_or(u32::MAX);
        signature.int32(SIGTAG_SIZE, total).bin(SIGTAG_MD5, &[0xaa; 16]);
        if let Some(size) = self.signature_payload_size {
            signature.int32(SIGTAG_PAYLOADSIZE, size);
        }
        let signature = signature.finish();

        let mut bytes = vec![0u8; LEAD_SIZE as usize];
        bytes[..4].copy_from_slice(&LEAD_MAGIC);
        // Lead major/minor version 3.0, binary package.
        bytes[4] = 3;
        bytes.extend_from_slice(&signature);
        bytes.resize(bytes.len() + (8 - signature.len() % 8) % 8, 0);
        bytes.extend_from_slice(&main);
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// A canned tag value served by [`MockDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockValue {
    Str(String),
    Number(u64),
    /// Present in the header but undecodable.
    Malformed,
}

/// Canned tag values for one package file.
#[derive(Debug, Clone, Default)]
pub struct MockPackage {
    tags: HashMap<Tag, MockValue>,
}
impl MockPackage {
    /// A package with every required tag populated.
    pub fn new(name: &str, version: &str, release: &str, arch: &str) -> Self {
        Self::default()
            .string(Tag::Name, name)
            .string(Tag::Version, version)
            .string(Tag::Release, release)
            .string(Tag::Arch, arch)
            .string(Tag::Summary, &format!("{name} package"))
            .string(Tag::Description, &format!("The {name} package."))
            .number(Tag::BuildTime, 1_700_000_000)
            .number(Tag::Size, 4096)
            .number(Tag::ArchiveSize, 4608)
    }

    pub fn string(mut self, tag: Tag, value: &str) -> Self {
        self.tags.insert(tag, MockValue::Str(value.to_string()));
        self
    }

    pub fn number(mut self, tag: Tag, value: u64) -> Self {
        self.tags.insert(tag, MockValue::Number(value));
        self
    }

    pub fn malformed(mut self, tag: Tag) -> Self {
        self.tags.insert(tag, MockValue::Malformed);
        self
    }

    pub fn without(mut self, tag: Tag) -> Self {
        self.tags.remove(&tag);
        self
    }
}

/// Decoder serving [`MockPackage`] values keyed by file name.
///
/// Files without a registered package fail to open. Clones share the same
/// registry and handle counters.
#[derive(Debug, Clone, Default)]
pub struct MockDecoder {
    packages: Arc<RwLock<HashMap<String, MockPackage>>>,
    open: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
}
impl MockDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, file_name: impl Into<String>, package: MockPackage) -> &Self {
        if let Ok(mut packages) = self.packages.write() {
            packages.insert(file_name.into(), package);
        }
        self
    }

    /// Handles currently open.
    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Handles ever opened.
    pub fn total_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}
impl Decoder for MockDecoder {
    type Handle = MockHandle;

    fn open(&self, path: &Path) -> Result<MockHandle> {
        let name = path.file_name().and_then(|n| n.to_str()).ok_or_raise(|| ErrorKind::Open)?;
        let package = {
            let packages = self.packages.read().ok().ok_or_raise(|| ErrorKind::Open)?;
            packages.get(name).cloned().ok_or_raise(|| ErrorKind::NotAPackage("no canned package registered"))?
        };
        let file = File::open(path).or_raise(|| ErrorKind::Open)?;
        self.open.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockHandle {
            package,
            locator: RangeLocator::new(file),
            open: Arc::clone(&self.open),
        })
    }
}

#[derive(Debug)]
pub struct MockHandle {
    package: MockPackage,
    locator: RangeLocator<File>,
    open: Arc<AtomicUsize>,
}
impl PackageHeader for MockHandle {
    fn get_string(&self, tag: Tag) -> Result<Option<String>> {
        match self.package.tags.get(&tag) {
            None => Ok(None),
            Some(MockValue::Str(s)) => Ok(Some(s.clone())),
            Some(MockValue::Number(n)) => Ok(Some(n.to_string())),
            Some(MockValue::Malformed) => exn::bail!(ErrorKind::Malformed(tag)),
        }
    }

    fn get_number(&self, tag: Tag) -> Result<Option<u64>> {
        match self.package.tags.get(&tag) {
            None => Ok(None),
            Some(MockValue::Number(n)) => Ok(Some(*n)),
            Some(MockValue::Str(_) | MockValue::Malformed) => exn::bail!(ErrorKind::Malformed(tag)),
        }
    }

    fn header_range(&mut self) -> Result<HeaderRange> {
        self.locator.locate().or_raise(|| ErrorKind::HeaderRange)
    }
}
impl Drop for MockHandle {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
