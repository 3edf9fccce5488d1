//! Lazy, cancellable walk of a directory tree for package files.

use crate::error::{ErrorKind, Result};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::sync::CancellationToken;

enum WalkEntry {
    File(PathBuf),
    /// Children of a directory, sorted by name.
    Descend(Vec<PathBuf>),
    Skip,
}

/// Walk `root` and yield the absolute path of every file whose name ends
/// with `suffix`.
///
/// Entries are visited in lexical pre-order. The root itself is followed if
/// it is a symlink; nested symlinks to directories are skipped, symlinks to
/// files are yielded like the files they point at. Any I/O failure ends the
/// walk with a single [`ErrorKind::Discovery`] naming the offending path.
///
/// The token is checked before every filesystem access. Once cancelled the
/// walk yields [`ErrorKind::Cancelled`] and ends.
pub fn discover(
    root: impl Into<PathBuf>,
    suffix: impl Into<String>,
    token: CancellationToken,
) -> impl Stream<Item = Result<PathBuf>> + Send + 'static {
    let root = root.into();
    let suffix = suffix.into();
    stream!({
        let start = match std::path::absolute(&root).or_raise(|| ErrorKind::Discovery(root.clone())) {
            Ok(start) => start,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let mut stack = vec![(start, true)];
        while let Some((path, is_root)) = stack.pop() {
            match visit(&path, is_root, &suffix, &root, &token).await {
                Ok(WalkEntry::File(file)) => yield Ok(file),
                Ok(WalkEntry::Descend(children)) => stack.extend(children.into_iter().rev().map(|c| (c, false))),
                Ok(WalkEntry::Skip) => {},
                Err(e) => {
                    yield Err(e);
                    return;
                },
            }
        }
    })
}

fn cancelled(token: &CancellationToken, root: &Path) -> Result<()> {
    if token.is_cancelled() {
        exn::bail!(ErrorKind::Cancelled(root.to_path_buf()));
    }
    Ok(())
}

async fn visit(path: &Path, is_root: bool, suffix: &str, root: &Path, token: &CancellationToken) -> Result<WalkEntry> {
    let walk_error = || ErrorKind::Discovery(path.to_path_buf());

    cancelled(token, root)?;
    let metadata = if is_root { fs::metadata(path).await } else { fs::symlink_metadata(path).await };
    let mut metadata = metadata.or_raise(walk_error)?;

    if metadata.file_type().is_symlink() {
        cancelled(token, root)?;
        metadata = fs::metadata(path).await.or_raise(walk_error)?;
        if metadata.is_dir() {
            tracing::debug!(path = %path.display(), "skipping symlinked directory");
            return Ok(WalkEntry::Skip);
        }
    }

    if metadata.is_dir() {
        tracing::debug!(path = %path.display(), "descending into directory");
        return read_children(path, root, token).await.map(WalkEntry::Descend);
    }
    if !metadata.is_file() {
        tracing::debug!(path = %path.display(), "skipping special file");
        return Ok(WalkEntry::Skip);
    }
    if matches_suffix(path, suffix) {
        Ok(WalkEntry::File(path.to_path_buf()))
    } else {
        tracing::debug!(path = %path.display(), "skipping non-package file");
        Ok(WalkEntry::Skip)
    }
}

async fn read_children(dir: &Path, root: &Path, token: &CancellationToken) -> Result<Vec<PathBuf>> {
    let walk_error = || ErrorKind::Discovery(dir.to_path_buf());
    cancelled(token, root)?;
    let mut entries = fs::read_dir(dir).await.or_raise(walk_error)?;
    let mut children = Vec::new();
    loop {
        cancelled(token, root)?;
        match entries.next_entry().await.or_raise(walk_error)? {
            Some(entry) => children.push(entry.path()),
            None => break,
        }
    }
    children.sort();
    Ok(children)
}

fn matches_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name().is_some_and(|name| name.as_encoded_bytes().ends_with(suffix.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rstest::rstest;
    use std::fs as std_fs;

    fn touch(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        std_fs::create_dir_all(path.parent().unwrap()).unwrap();
        std_fs::write(&path, b"").unwrap();
        path
    }

    async fn collect(root: &Path, suffix: &str, token: CancellationToken) -> Vec<Result<PathBuf>> {
        discover(root, suffix, token).collect().await
    }

    #[tokio::test]
    async fn test_yields_only_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let matching = ["a.rpm", "nested/b.rpm", "nested/deeper/c.rpm"];
        let other = ["a.rpm.sig", "README", "nested/b.RPM", "nested/deeper/rpm"];
        for name in matching.iter().chain(other.iter()) {
            touch(dir.path(), name);
        }
        let found: Vec<PathBuf> = collect(dir.path(), ".rpm", CancellationToken::new())
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(found.len(), matching.len());
        assert!(found.iter().all(|p| p.is_absolute()));
    }

    #[tokio::test]
    async fn test_lexical_pre_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.rpm", "a/z.rpm", "a.rpm", "c/a.rpm", "a/b/c.rpm"] {
            touch(dir.path(), name);
        }
        let found: Vec<PathBuf> = collect(dir.path(), ".rpm", CancellationToken::new())
            .await
            .into_iter()
            .map(|r| r.unwrap().strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        let expected: Vec<PathBuf> =
            ["a/b/c.rpm", "a/z.rpm", "a.rpm", "b.rpm", "c/a.rpm"].into_iter().map(PathBuf::from).collect();
        assert_eq!(found, expected);
    }

    #[rstest]
    #[case(".rpm", 2)]
    #[case(".src.rpm", 1)]
    #[case(".deb", 0)]
    #[tokio::test]
    async fn test_custom_suffix(#[case] suffix: &str, #[case] expected: usize) {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "bash-5.2-1.x86_64.rpm");
        touch(dir.path(), "bash-5.2-1.src.rpm");
        let found = collect(dir.path(), suffix, CancellationToken::new()).await;
        assert_eq!(found.len(), expected);
    }

    #[tokio::test]
    async fn test_missing_root_is_discovery_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("missing");
        let results = collect(&root, ".rpm", CancellationToken::new()).await;
        assert_eq!(results.len(), 1);
        let err = results.into_iter().next().unwrap().unwrap_err();
        assert_eq!(*err, ErrorKind::Discovery(root));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.rpm");
        let token = CancellationToken::new();
        token.cancel();
        let results = collect(dir.path(), ".rpm", token).await;
        assert_eq!(results.len(), 1);
        let err = results.into_iter().next().unwrap().unwrap_err();
        assert_eq!(*err, ErrorKind::Cancelled(dir.path().to_path_buf()));
    }

    #[tokio::test]
    async fn test_cancelled_mid_walk() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.rpm", "b.rpm", "c.rpm"] {
            touch(dir.path(), name);
        }
        let token = CancellationToken::new();
        let mut stream = Box::pin(discover(dir.path(), ".rpm", token.clone()));
        assert!(stream.next().await.unwrap().is_ok());
        token.cancel();
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(*err, ErrorKind::Cancelled(_)));
        assert!(stream.next().await.is_none());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_directories_are_logged() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "nested/a.rpm");
        touch(dir.path(), "nested/notes.txt");
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let found = collect(dir.path(), ".rpm", CancellationToken::new()).await;
        assert_eq!(found.len(), 1);
        let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("descending into directory"));
        assert!(logs.contains(&dir.path().join("nested").display().to_string()));
        assert!(logs.contains("skipping non-package file"));
    }

    #[tokio::test]
    async fn test_walk_can_be_restarted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.rpm");
        let first = collect(dir.path(), ".rpm", CancellationToken::new()).await;
        let second = collect(dir.path(), ".rpm", CancellationToken::new()).await;
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[cfg(unix)]
    mod symlinks {
        use super::*;
        use std::os::unix::fs::symlink;

        #[tokio::test]
        async fn test_file_symlink_is_yielded() {
            let dir = tempfile::tempdir().unwrap();
            let target = touch(dir.path(), "store/real.bin");
            symlink(&target, dir.path().join("linked.rpm")).unwrap();
            let found: Vec<PathBuf> = collect(dir.path(), ".rpm", CancellationToken::new())
                .await
                .into_iter()
                .map(|r| r.unwrap())
                .collect();
            assert_eq!(found, vec![dir.path().join("linked.rpm")]);
        }

        #[tokio::test]
        async fn test_nested_directory_symlink_is_skipped() {
            let dir = tempfile::tempdir().unwrap();
            touch(dir.path(), "a/pkg.rpm");
            // A loop back to the root would never terminate if followed.
            symlink(dir.path(), dir.path().join("a/loop")).unwrap();
            let found = collect(dir.path(), ".rpm", CancellationToken::new()).await;
            assert_eq!(found.len(), 1);
        }

        #[tokio::test]
        async fn test_symlinked_root_is_followed() {
            let dir = tempfile::tempdir().unwrap();
            touch(dir.path(), "real/pkg.rpm");
            let root = dir.path().join("root");
            symlink(dir.path().join("real"), &root).unwrap();
            let found = collect(&root, ".rpm", CancellationToken::new()).await;
            assert_eq!(found.len(), 1);
        }

        #[tokio::test]
        async fn test_broken_symlink_ends_walk() {
            let dir = tempfile::tempdir().unwrap();
            touch(dir.path(), "a.rpm");
            let broken = dir.path().join("b.rpm");
            symlink(dir.path().join("nowhere"), &broken).unwrap();
            touch(dir.path(), "c.rpm");
            let results = collect(dir.path(), ".rpm", CancellationToken::new()).await;
            assert_eq!(results.len(), 2);
            assert!(results[0].is_ok());
            assert_eq!(**results[1].as_ref().unwrap_err(), ErrorKind::Discovery(broken));
        }
    }
}
