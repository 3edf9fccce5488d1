//! rpmindex: scan a directory of RPM packages and write its repodata indexes.

mod cli;
mod error;

use crate::cli::Args;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use rpmindex_cache::{Database, IndexKind, KeyRepository, Repository};
use rpmindex_config::Config;
use rpmindex_extract::NativeDecoder;
use rpmindex_library::error::ErrorKind as LibraryErrorKind;
use rpmindex_library::{Context, RepositorySink, ScanSummary};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("rpmindex: {e:?}");
            return ExitCode::FAILURE;
        },
    };
    init_logging(&config.log.level);

    let token = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(token.clone()));

    match run(&args.dir, &config, token).await {
        Ok(summary) => {
            tracing::info!(indexed = summary.indexed, skipped = summary.skipped, "done");
            ExitCode::SUCCESS
        },
        Err(e) => {
            if *e == ErrorKind::Cancelled {
                tracing::warn!("interrupted, no index written");
            } else {
                tracing::error!(error = ?e, retryable = e.is_retryable(), "failed");
            }
            ExitCode::from(e.exit_code())
        },
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    args.apply(&mut config);
    config.validate().or_raise(|| ErrorKind::Config)?;
    Ok(config)
}

/// `RUST_LOG`, when set, takes precedence over the configured level.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn cancel_on_interrupt(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("interrupt received, stopping");
        token.cancel();
    }
}

async fn run(root: &Path, config: &Config, token: CancellationToken) -> Result<ScanSummary> {
    let ctx = Arc::new(
        Context::builder(NativeDecoder)
            .checksum(config.scan.checksum)
            .suffix(config.scan.suffix.as_str())
            .concurrency(config.scan.concurrency)
            .queue_capacity(config.scan.queue_capacity)
            .build(),
    );

    let dry_run = config.database.dry_run;
    let primary = config.database_path(root);
    let mut databases = Vec::with_capacity(IndexKind::ALL.len());
    for kind in IndexKind::ALL {
        let db = if dry_run {
            Database::connect_in_memory_index(kind).await
        } else {
            Database::create_index(kind, index_path(&primary, kind)).await
        };
        match db {
            Ok(db) => databases.push(db),
            Err(e) => {
                close_all(&databases).await;
                return Err(e.raise(ErrorKind::Database));
            },
        }
    }

    let Some((primary_db, side)) = databases.split_first() else {
        exn::bail!(ErrorKind::Database);
    };
    let mut sink = side.iter().fold(
        RepositorySink::new(Repository::new(primary_db.pool().clone(), dry_run), root),
        |sink, db| sink.with_keys(KeyRepository::new(db.pool().clone(), dry_run)),
    );

    let result = rpmindex_library::index(ctx, root, token, &mut sink).await;
    close_all(&databases).await;

    let result = result.map_err(|e| {
        let kind = match *e {
            LibraryErrorKind::Cancelled(_) => ErrorKind::Cancelled,
            _ => ErrorKind::Scan,
        };
        e.raise(kind)
    });
    if dry_run {
        return result;
    }
    for kind in IndexKind::ALL {
        let path = index_path(&primary, kind);
        if result.is_err() {
            // A partial index must never be mistaken for a complete one.
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "unable to remove partial index");
            }
        } else {
            tracing::info!(path = %path.display(), written = sink.written(), "index written");
        }
    }
    result
}

/// The filelists and other indexes live next to the primary one.
fn index_path(primary: &Path, kind: IndexKind) -> PathBuf {
    match kind {
        IndexKind::Primary => primary.to_path_buf(),
        _ => primary.with_file_name(kind.file_name()),
    }
}

async fn close_all(databases: &[Database]) {
    for db in databases {
        db.close().await;
    }
}
