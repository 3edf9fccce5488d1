use async_trait::async_trait;
use exn::{Exn, OptionExt, ResultExt};
use rpmindex_cache::{KeyRepository, Repository};
use rpmindex_cache::error::ErrorKind as CacheErrorKind;
use rpmindex_extract::models::PackageRecord;
use std::convert::Infallible;
use std::path::PathBuf;

/// Destination for the records of a run.
///
/// A sink is driven by exactly one writer, so implementations need no
/// internal locking.
#[async_trait]
pub trait MetadataSink: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn accept(&mut self, record: PackageRecord) -> Result<(), Exn<Self::Error>>;
}

#[async_trait]
impl MetadataSink for Vec<PackageRecord> {
    type Error = Infallible;

    async fn accept(&mut self, record: PackageRecord) -> Result<(), Exn<Self::Error>> {
        self.push(record);
        Ok(())
    }
}

/// Writes records into the primary index, and mirrors each assigned package
/// key into any attached filelists or other index.
#[derive(Debug)]
pub struct RepositorySink {
    repo: Repository,
    keys: Vec<KeyRepository>,
    root: PathBuf,
    written: u64,
}

impl RepositorySink {
    /// `root` is the scanned directory; each package's `location_href` is
    /// its path relative to it.
    pub fn new(repo: Repository, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { repo, keys: Vec::new(), root, written: 0 }
    }

    /// Also record every package key in `keys`.
    pub fn with_keys(mut self, keys: KeyRepository) -> Self {
        self.keys.push(keys);
        self
    }

    /// Records accepted so far, dry-run included.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    fn location_href(&self, record: &PackageRecord) -> Result<String, Exn<CacheErrorKind>> {
        let relative = record.path.strip_prefix(&self.root).or_raise(|| CacheErrorKind::InvalidData("location_href"))?;
        let href = relative.to_str().ok_or_raise(|| CacheErrorKind::InvalidData("location_href"))?;
        Ok(href.to_string())
    }
}

#[async_trait]
impl MetadataSink for RepositorySink {
    type Error = CacheErrorKind;

    async fn accept(&mut self, record: PackageRecord) -> Result<(), Exn<Self::Error>> {
        let href = self.location_href(&record)?;
        if let Some(key) = self.repo.insert(&record, &href).await? {
            for keys in &self.keys {
                keys.insert(key, record.pkg_id()).await?;
            }
        }
        self.written += 1;
        tracing::debug!(location_href = %href, nevra = %record.nevra(), "indexed");
        Ok(())
    }
}
