//! Types for the build manifest.

use std::io;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading or validating `build.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("build manifest not found: {0}")]
  NotFound(PathBuf),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("{path}: missing [{section}] section")]
  MissingSection { path: PathBuf, section: &'static str },

  #[error("{path}: missing required key '{key}'")]
  MissingKey { path: PathBuf, key: &'static str },

  /// Only tool dependencies may be declared at the top level.
  #[error("{path}: illegal dependency kind '{kind}' in [deps] (only 'build' is allowed here)")]
  IllegalDepKind { path: PathBuf, kind: String },

  #[error("{path}: invalid value for '{key}': {message}")]
  InvalidValue {
    path: PathBuf,
    key: String,
    message: String,
  },

  #[error("mapping file not found: {0}")]
  MappingNotFound(PathBuf),

  #[error("failed to create prefix {path}: {source}")]
  CreatePrefix {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Command-line level overrides and switches.
///
/// `build_name`, `prefix` and `triplet` replace the manifest values when set
/// to a non-empty value.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
  pub build_name: Option<String>,
  pub prefix: Option<PathBuf>,
  pub triplet: Option<String>,

  /// Rebuild projects the ledger already marks as built.
  pub rebuild: bool,

  /// Skip real build actions.
  pub dry_run: bool,

  /// Confirm build-tool prompts automatically.
  pub assume_yes: bool,

  /// Append build step stdout here instead of inheriting it.
  pub stdout: Option<PathBuf>,

  /// Append build step stderr here instead of inheriting it.
  pub stderr: Option<PathBuf>,

  /// Maximum number of project build steps running at once.
  pub max_jobs: Option<usize>,
}

/// The fully resolved build session settings. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
  pub rebuild: bool,
  pub dry_run: bool,
  pub assume_yes: bool,
  pub stdout: Option<PathBuf>,
  pub stderr: Option<PathBuf>,

  /// Absolute build root, containing the manifest and all projects.
  pub build_dir: PathBuf,
  pub build_toml_path: PathBuf,
  pub mapping_toml_path: PathBuf,

  pub build_name: String,

  /// Absolute install destination.
  pub prefix: PathBuf,

  /// Target platform triplet, exported as `ZCHOST`.
  pub triplet: String,

  /// `[env]` entries in manifest order, unexpanded.
  pub environ: Vec<(String, String)>,

  /// Global build-tool dependencies (`deps.build`).
  pub build_deps: Vec<String>,

  pub max_jobs: Option<usize>,
}

impl BuildSettings {
  /// Path of the dependency ledger under the prefix.
  pub fn ledger_path(&self) -> PathBuf {
    self.prefix.join(crate::consts::LEDGER_FILENAME)
  }
}

/// On-disk shape of `build.toml`.
#[derive(Debug, Deserialize)]
pub(crate) struct RawManifest {
  pub info: Option<RawInfo>,
  #[serde(default)]
  pub env: toml::Table,
  #[serde(default)]
  pub deps: toml::Table,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct RawInfo {
  pub build_name: Option<String>,
  pub prefix: Option<String>,
  pub hostname: Option<String>,
  pub mapping: Option<String>,
}
