//! Discovery and extraction pipeline.
//!
//! A run walks a directory for package files ([`discover`]), extracts the
//! metadata of each one on a pool of blocking workers ([`scan`]) and, through
//! [`index`], drains the results into a single [`MetadataSink`].
//!
//! Everything a run needs lives in an explicitly constructed [`Context`];
//! there is no global state.

mod discover;
pub mod error;
#[cfg(test)]
mod fixtures;
mod scan;
mod sink;

pub use crate::discover::discover;
pub use crate::scan::{ScanEvent, ScanSummary, index, scan};
pub use crate::sink::{MetadataSink, RepositorySink};

use rpmindex_extract::{ChecksumKind, Decoder, Extractor};

pub const DEFAULT_SUFFIX: &str = ".rpm";
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Per-run state shared by every stage of the pipeline.
///
/// Dropping the context (once every task holding it has finished) releases
/// the decoder.
#[derive(Debug)]
pub struct Context<D> {
    extractor: Extractor<D>,
    suffix: String,
    concurrency: usize,
    queue_capacity: usize,
}

impl<D: Decoder> Context<D> {
    pub fn builder(decoder: D) -> ContextBuilder<D> {
        ContextBuilder {
            decoder,
            checksum: ChecksumKind::default(),
            suffix: DEFAULT_SUFFIX.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn extractor(&self) -> &Extractor<D> {
        &self.extractor
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Number of extraction workers.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Capacity of each bounded channel between stages.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

#[derive(Debug)]
pub struct ContextBuilder<D> {
    decoder: D,
    checksum: ChecksumKind,
    suffix: String,
    concurrency: usize,
    queue_capacity: usize,
}

impl<D: Decoder> ContextBuilder<D> {
    pub fn checksum(mut self, kind: ChecksumKind) -> Self {
        self.checksum = kind;
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Clamped to at least one worker.
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers.max(1);
        self
    }

    /// Clamped to at least one slot.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> Context<D> {
        Context {
            extractor: Extractor::new(self.decoder, self.checksum),
            suffix: self.suffix,
            concurrency: self.concurrency,
            queue_capacity: self.queue_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpmindex_extract::NativeDecoder;

    #[test]
    fn test_builder_defaults() {
        let ctx = Context::builder(NativeDecoder).build();
        assert_eq!(ctx.suffix(), ".rpm");
        assert_eq!(ctx.concurrency(), DEFAULT_CONCURRENCY);
        assert_eq!(ctx.queue_capacity(), DEFAULT_QUEUE_CAPACITY);
        assert_eq!(ctx.extractor().checksum_kind(), ChecksumKind::Sha256);
    }

    #[test]
    fn test_builder_clamps_to_one() {
        let ctx = Context::builder(NativeDecoder)
            .concurrency(0)
            .queue_capacity(0)
            .suffix(".drpm")
            .checksum(ChecksumKind::Sha512)
            .build();
        assert_eq!(ctx.concurrency(), 1);
        assert_eq!(ctx.queue_capacity(), 1);
        assert_eq!(ctx.suffix(), ".drpm");
        assert_eq!(ctx.extractor().checksum_kind(), ChecksumKind::Sha512);
    }
}
