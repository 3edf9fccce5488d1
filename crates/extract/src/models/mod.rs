mod package;

pub use self::package::PackageRecord;
