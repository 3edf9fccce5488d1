//! The extraction pipeline.
//!
//! ```text
//! discover ──paths──▶ worker × concurrency ──events──▶ stream consumer
//!  (task)   bounded     (spawn_blocking)      bounded
//! ```
//!
//! Every stage owns its `Sender`, so a stage exiting for any reason closes
//! its channel and lets the next stage drain and finish.

use crate::discover::discover;
use crate::error::{Error, ErrorKind, Result};
use crate::sink::MetadataSink;
use crate::Context;
use async_stream::stream;
use exn::Exn;
use futures::{Stream, StreamExt};
use rpmindex_extract::Decoder;
use rpmindex_extract::models::PackageRecord;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum ScanEvent {
    /// Always the first event of a run.
    Started,
    Indexed(Box<PackageRecord>),
    /// A single package could not be extracted. The run carries on.
    Skipped { path: PathBuf, error: Error },
    /// Always the last event of a successful run.
    Complete(ScanSummary),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub discovered: u64,
    pub indexed: u64,
    pub skipped: u64,
}

/// Scan `root` and stream one event per discovered package.
///
/// The stream starts with [`ScanEvent::Started`] and, on success, ends with
/// [`ScanEvent::Complete`]. A failed run ends with a single error instead:
/// [`ErrorKind::Discovery`] if the walk broke, or [`ErrorKind::Cancelled`]
/// if `token` fired. Results that complete after cancellation are dropped.
///
/// Dropping the stream cancels every task of the run; `token` itself is
/// never cancelled by the pipeline.
pub fn scan<D>(
    ctx: Arc<Context<D>>,
    root: impl Into<PathBuf>,
    token: CancellationToken,
) -> impl Stream<Item = Result<ScanEvent>> + Send + 'static
where
    D: Decoder + 'static,
{
    let root = root.into();
    stream!({
        let run = token.child_token();
        let _guard = run.clone().drop_guard();

        yield Ok(ScanEvent::Started);
        if run.is_cancelled() {
            yield Err(ErrorKind::Cancelled(root).into());
            return;
        }
        tracing::info!(root = %root.display(), workers = ctx.concurrency(), "scanning");

        let (path_tx, path_rx) = mpsc::channel(ctx.queue_capacity());
        let (event_tx, mut event_rx) = mpsc::channel(ctx.queue_capacity());

        let discovery = tokio::spawn(feed(root.clone(), ctx.suffix().to_string(), run.clone(), path_tx));
        let path_rx = Arc::new(Mutex::new(path_rx));
        let mut workers = JoinSet::new();
        for _ in 0..ctx.concurrency() {
            workers.spawn(worker(Arc::clone(&ctx), Arc::clone(&path_rx), event_tx.clone(), run.clone()));
        }
        drop(event_tx);

        let mut summary = ScanSummary::default();
        loop {
            let event = tokio::select! {
                biased;
                _ = run.cancelled() => None,
                event = event_rx.recv() => event,
            };
            match event {
                Some(ScanEvent::Indexed(record)) => {
                    summary.indexed += 1;
                    yield Ok(ScanEvent::Indexed(record));
                },
                Some(ScanEvent::Skipped { path, error }) => {
                    summary.skipped += 1;
                    yield Ok(ScanEvent::Skipped { path, error });
                },
                Some(_) => {},
                None => break,
            }
        }

        // Let in-flight extractions finish; whatever they produce is dropped.
        event_rx.close();
        while workers.join_next().await.is_some() {}
        let discovered = discovery.await;

        if run.is_cancelled() {
            tracing::info!(indexed = summary.indexed, skipped = summary.skipped, "scan cancelled");
            yield Err(ErrorKind::Cancelled(root).into());
            return;
        }
        match discovered {
            Ok(Ok(count)) => {
                summary.discovered = count;
                tracing::info!(
                    discovered = summary.discovered,
                    indexed = summary.indexed,
                    skipped = summary.skipped,
                    "scan complete"
                );
                yield Ok(ScanEvent::Complete(summary));
            },
            Ok(Err(e)) => yield Err(e),
            Err(e) => yield Err(Exn::from(e).raise(ErrorKind::Discovery(root))),
        }
    })
}

/// Walks `root` and submits every package path, returning how many were
/// submitted.
async fn feed(root: PathBuf, suffix: String, token: CancellationToken, paths: mpsc::Sender<PathBuf>) -> Result<u64> {
    let mut submitted = 0;
    let mut discovered = Box::pin(discover(root.clone(), suffix, token.clone()));
    while let Some(path) = discovered.next().await {
        let path = path?;
        tokio::select! {
            biased;
            _ = token.cancelled() => exn::bail!(ErrorKind::Cancelled(root)),
            sent = paths.send(path) => if sent.is_err() {
                break;
            },
        }
        submitted += 1;
    }
    Ok(submitted)
}

async fn worker<D>(
    ctx: Arc<Context<D>>,
    paths: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
    events: mpsc::Sender<ScanEvent>,
    token: CancellationToken,
) where
    D: Decoder + 'static,
{
    loop {
        let path = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            path = async { paths.lock().await.recv().await } => path,
        };
        let Some(path) = path else { break };

        let extraction = {
            let ctx = Arc::clone(&ctx);
            let path = path.clone();
            tokio::task::spawn_blocking(move || ctx.extractor().extract(&path)).await
        };
        let event = match extraction {
            Ok(Ok(record)) => ScanEvent::Indexed(Box::new(record)),
            Ok(Err(e)) => skipped(e.raise(ErrorKind::Extraction(path.clone())), path),
            Err(e) => skipped(Exn::from(e).raise(ErrorKind::Worker(path.clone())), path),
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            sent = events.send(event) => if sent.is_err() {
                break;
            },
        }
    }
}

fn skipped(error: Error, path: PathBuf) -> ScanEvent {
    tracing::warn!(path = %path.display(), error = ?error, "skipping package");
    ScanEvent::Skipped { path, error }
}

/// Scan `root` and write every extracted record into `sink`.
///
/// Records reach the sink one at a time, in the order the pipeline produces
/// them. If the sink fails the run is cancelled and [`ErrorKind::Sink`] is
/// returned; `token` is left untouched.
pub async fn index<D, S>(
    ctx: Arc<Context<D>>,
    root: impl Into<PathBuf>,
    token: CancellationToken,
    sink: &mut S,
) -> Result<ScanSummary>
where
    D: Decoder + 'static,
    S: MetadataSink + ?Sized,
{
    let root = root.into();
    let run = token.child_token();
    let mut events = Box::pin(scan(ctx, root.clone(), run.clone()));
    while let Some(event) = events.next().await {
        match event? {
            ScanEvent::Indexed(record) => {
                if let Err(e) = sink.accept(*record).await {
                    run.cancel();
                    return Err(e.raise(ErrorKind::Sink));
                }
            },
            ScanEvent::Complete(summary) => return Ok(summary),
            ScanEvent::Started | ScanEvent::Skipped { .. } => {},
        }
    }
    exn::bail!(ErrorKind::Cancelled(root))
}
