mod package;

pub use self::package::IndexedPackage;
pub(crate) use self::package::{NewPackageRow, PackageRow};
