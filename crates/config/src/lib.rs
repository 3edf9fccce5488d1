//! Layered configuration for rpmindex.
//!
//! Sources are merged in order, each overriding the last:
//!
//! 1. Built-in defaults.
//! 2. A configuration file: either an explicit path (TOML, YAML or JSON,
//!    chosen by extension) or `config.toml` in the platform config directory.
//! 3. Environment variables prefixed with `RPMINDEX_`, with `__` separating
//!    nested keys (`RPMINDEX_SCAN__CONCURRENCY=8`).
//!
//! Command-line flags are applied on top by the binary.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use rpmindex_extract::ChecksumKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const ENV_PREFIX: &str = "RPMINDEX_";
const ENV_SEPARATOR: &str = "__";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File name suffix identifying packages. Matched case-sensitively.
    pub suffix: String,
    /// Number of extraction workers.
    pub concurrency: usize,
    /// Capacity of each bounded channel in the pipeline.
    pub queue_capacity: usize,
    pub checksum: ChecksumKind,
}
impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            suffix: ".rpm".to_string(),
            concurrency: 4,
            queue_capacity: 64,
            checksum: ChecksumKind::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Where to write the index. Defaults to `repodata/primary.sqlite`
    /// under the scanned directory.
    pub path: Option<PathBuf>,
    /// Scan and extract, but write nothing.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}
impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// The file consulted when no explicit configuration path is given.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rpmindex").map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Loads configuration from every source.
    ///
    /// An explicit `file` must exist; the default file is optional.
    #[instrument]
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let figment = match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::Load);
                }
                Self::figment_with_file(path)?
            },
            None => match default_path() {
                Some(path) => Self::figment_with_file(&path)?,
                None => Self::defaults(),
            },
        };
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR)))
    }

    /// Parses a TOML document on top of the defaults.
    pub fn from_toml(toml: &str) -> Result<Self> {
        Self::from_figment(Self::defaults().merge(Toml::string(toml)))
    }

    fn defaults() -> Figment {
        Figment::new().merge(Serialized::defaults(Config::default()))
    }

    fn figment_with_file(path: &Path) -> Result<Figment> {
        let figment = Self::defaults();
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        let figment = match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        };
        tracing::debug!(path = %path.display(), "configuration file");
        Ok(figment)
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialize fine but make no sense.
    pub fn validate(&self) -> Result<()> {
        if self.scan.suffix.is_empty() {
            exn::bail!(ErrorKind::Validation("scan.suffix must not be empty"));
        }
        if self.scan.concurrency == 0 {
            exn::bail!(ErrorKind::Validation("scan.concurrency must be at least 1"));
        }
        if self.scan.queue_capacity == 0 {
            exn::bail!(ErrorKind::Validation("scan.queue_capacity must be at least 1"));
        }
        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            exn::bail!(ErrorKind::Validation("log.level must be one of trace, debug, info, warn, error"));
        }
        Ok(())
    }

    /// Index location for a scan of `root`.
    pub fn database_path(&self, root: &Path) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| root.join("repodata").join("primary.sqlite"))
    }
}
