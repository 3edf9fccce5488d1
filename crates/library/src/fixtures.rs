use rpmindex_extract::mock::PackageBuilder;
use std::path::{Path, PathBuf};

/// Writes a valid package named `name` at `root/relative`.
pub(crate) fn package(root: &Path, relative: &str, name: &str) -> PathBuf {
    write(root, relative, &PackageBuilder::new(name, "1.0", "1", "x86_64").build())
}

/// Writes a file that carries the package suffix but no package.
pub(crate) fn corrupt(root: &Path, relative: &str) -> PathBuf {
    write(root, relative, b"this is not a package, only a file with the right name")
}

pub(crate) fn write(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}
