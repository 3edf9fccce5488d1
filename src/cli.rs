use clap::{ArgAction, Parser, ValueEnum};
use rpmindex_config::Config;
use rpmindex_extract::ChecksumKind;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChecksumArg {
    Sha256,
    Sha512,
}
impl From<ChecksumArg> for ChecksumKind {
    fn from(arg: ChecksumArg) -> Self {
        match arg {
            ChecksumArg::Sha256 => ChecksumKind::Sha256,
            ChecksumArg::Sha512 => ChecksumKind::Sha512,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "rpmindex", version)]
#[command(about = "Scan a directory of RPM packages and build a primary metadata index", long_about = None)]
pub struct Args {
    /// Directory to scan for packages
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Where to write the index [default: DIR/repodata/primary.sqlite]
    #[arg(long, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Number of extraction workers
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Checksum algorithm used for package identifiers
    #[arg(long, value_enum)]
    pub checksum: Option<ChecksumArg>,

    /// Scan and extract, but do not write an index
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Command-line flags win over every configuration source.
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.database {
            config.database.path = Some(path.clone());
        }
        if let Some(workers) = self.concurrency {
            config.scan.concurrency = workers;
        }
        if let Some(checksum) = self.checksum {
            config.scan.checksum = checksum.into();
        }
        if self.dry_run {
            config.database.dry_run = true;
        }
        match self.verbose {
            0 => {},
            1 => config.log.level = "debug".to_string(),
            _ => config.log.level = "trace".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_leave_config_alone() {
        let args = Args::try_parse_from(["rpmindex", "/srv/repo"]).unwrap();
        assert_eq!(args.dir, PathBuf::from("/srv/repo"));
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "rpmindex",
            "/srv/repo",
            "--database",
            "/tmp/primary.sqlite",
            "-j",
            "12",
            "--checksum",
            "sha512",
            "--dry-run",
        ])
        .unwrap();
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/primary.sqlite")));
        assert_eq!(config.scan.concurrency, 12);
        assert_eq!(config.scan.checksum, ChecksumKind::Sha512);
        assert!(config.database.dry_run);
    }

    #[rstest]
    #[case(&["rpmindex", "."], "info")]
    #[case(&["rpmindex", ".", "-v"], "debug")]
    #[case(&["rpmindex", ".", "-vv"], "trace")]
    #[case(&["rpmindex", ".", "-vvv"], "trace")]
    fn test_verbosity(#[case] argv: &[&str], #[case] level: &str) {
        let args = Args::try_parse_from(argv).unwrap();
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.log.level, level);
    }

    #[test]
    fn test_zero_workers_fail_validation() {
        let args = Args::try_parse_from(["rpmindex", ".", "-j", "0"]).unwrap();
        let mut config = Config::default();
        args.apply(&mut config);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_directory_is_required() {
        assert!(Args::try_parse_from(["rpmindex"]).is_err());
    }
}
