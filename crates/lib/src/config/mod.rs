//! Build manifest loading.
//!
//! `build.toml` describes one build session:
//!
//! ```toml
//! [info]
//! build-name = "cross"
//! prefix = "/opt/cross"
//! hostname = "x86_64-w64-mingw32"
//! mapping = "mapping.toml"   # optional
//!
//! [env]
//! CFLAGS = "-I$ZCPREF/include"
//!
//! [deps]
//! build = ["make", "gcc"]
//! ```
//!
//! [`load`] turns it into [`BuildSettings`], [`validate`] checks the
//! filesystem side, and [`apply_environment`] resolves the variables child
//! build steps see.

mod types;

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info};

use crate::consts::{BUILD_TOML, DEFAULT_MAPPING_TOML, ENV_HOST, ENV_PREFIX, ENV_TOP};
use crate::env::{EnvironmentContext, to_posix};

pub use types::{BuildOptions, BuildSettings, ConfigError};
use types::RawManifest;

/// Upper bound on `max_jobs`.
pub const MAX_JOBS: usize = tokio::sync::Semaphore::MAX_PERMITS;

/// Load `build.toml` from `build_dir`, applying `options` on top.
pub fn load(build_dir: &Path, options: &BuildOptions) -> Result<BuildSettings, ConfigError> {
  let build_dir = std::path::absolute(build_dir).map_err(|source| ConfigError::Read {
    path: build_dir.to_path_buf(),
    source,
  })?;
  let build_toml_path = build_dir.join(BUILD_TOML);

  let content = match fs::read_to_string(&build_toml_path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ConfigError::NotFound(build_toml_path)),
    Err(source) => {
      return Err(ConfigError::Read {
        path: build_toml_path,
        source,
      });
    }
  };

  let raw: RawManifest = toml::from_str(&content).map_err(|source| ConfigError::Parse {
    path: build_toml_path.clone(),
    source,
  })?;

  let info = raw.info.ok_or_else(|| ConfigError::MissingSection {
    path: build_toml_path.clone(),
    section: "info",
  })?;
  let missing = |key| ConfigError::MissingKey {
    path: build_toml_path.clone(),
    key,
  };
  let manifest_name = info.build_name.ok_or_else(|| missing("info.build-name"))?;
  let manifest_prefix = info.prefix.ok_or_else(|| missing("info.prefix"))?;
  let manifest_host = info.hostname.ok_or_else(|| missing("info.hostname"))?;

  let build_name = non_empty(options.build_name.clone()).unwrap_or(manifest_name);
  let triplet = non_empty(options.triplet.clone()).unwrap_or(manifest_host);

  let prefix = match options.prefix.clone().filter(|p| !p.as_os_str().is_empty()) {
    Some(prefix) => std::path::absolute(&prefix).map_err(|source| ConfigError::Read { path: prefix, source })?,
    None => build_dir.join(manifest_prefix),
  };

  let mapping_toml_path = build_dir.join(info.mapping.as_deref().unwrap_or(DEFAULT_MAPPING_TOML));

  let mut environ = Vec::with_capacity(raw.env.len());
  for (key, value) in &raw.env {
    environ.push((key.clone(), env_value(&build_toml_path, key, value)?));
  }

  let mut build_deps = Vec::new();
  for (kind, value) in &raw.deps {
    if kind != "build" {
      return Err(ConfigError::IllegalDepKind {
        path: build_toml_path,
        kind: kind.clone(),
      });
    }
    build_deps = string_list(&build_toml_path, "deps.build", value)?;
  }

  let max_jobs = match options.max_jobs {
    Some(n) if n > MAX_JOBS => {
      return Err(ConfigError::InvalidValue {
        path: build_toml_path,
        key: "jobs".to_string(),
        message: format!("{n} exceeds the limit of {MAX_JOBS} concurrent jobs"),
      });
    }
    jobs => jobs.filter(|n| *n > 0),
  };

  let settings = BuildSettings {
    rebuild: options.rebuild,
    dry_run: options.dry_run,
    assume_yes: options.assume_yes,
    stdout: options.stdout.clone(),
    stderr: options.stderr.clone(),
    build_dir,
    build_toml_path,
    mapping_toml_path,
    build_name,
    prefix,
    triplet,
    environ,
    build_deps,
    max_jobs,
  };

  info!(
    build = %settings.build_name,
    prefix = %settings.prefix.display(),
    triplet = %settings.triplet,
    "loaded build manifest"
  );

  Ok(settings)
}

/// Check the filesystem against `settings`.
///
/// The mapping file must exist. The prefix is created (with parents) when
/// missing.
pub fn validate(settings: &BuildSettings) -> Result<(), ConfigError> {
  if !settings.mapping_toml_path.is_file() {
    return Err(ConfigError::MappingNotFound(settings.mapping_toml_path.clone()));
  }

  if !settings.prefix.is_dir() {
    debug!(prefix = %settings.prefix.display(), "creating prefix");
    fs::create_dir_all(&settings.prefix).map_err(|source| ConfigError::CreatePrefix {
      path: settings.prefix.clone(),
      source,
    })?;
  }

  Ok(())
}

/// Resolve the build environment into `ctx`.
///
/// `ZCPREF`, `ZCHOST` and `ZCTOP` are set first so `[env]` values can refer
/// to them; each `[env]` entry then sees every entry before it.
pub fn apply_environment(settings: &BuildSettings, ctx: &mut EnvironmentContext) {
  ctx.set(ENV_PREFIX, to_posix(&settings.prefix));
  ctx.set(ENV_HOST, settings.triplet.clone());
  ctx.set(ENV_TOP, to_posix(&settings.build_dir));

  for (key, value) in &settings.environ {
    let expanded = ctx.expand(value);
    debug!(key = %key, value = %expanded, "setting build environment variable");
    ctx.set(key.clone(), expanded);
  }
}

fn non_empty(value: Option<String>) -> Option<String> {
  value.filter(|s| !s.is_empty())
}

fn env_value(path: &Path, key: &str, value: &toml::Value) -> Result<String, ConfigError> {
  match value {
    toml::Value::String(s) => Ok(s.clone()),
    toml::Value::Integer(i) => Ok(i.to_string()),
    toml::Value::Float(f) => Ok(f.to_string()),
    toml::Value::Boolean(b) => Ok(b.to_string()),
    other => Err(ConfigError::InvalidValue {
      path: path.to_path_buf(),
      key: format!("env.{key}"),
      message: format!("expected a string, found {}", other.type_str()),
    }),
  }
}

pub(crate) fn string_list(path: &Path, key: &str, value: &toml::Value) -> Result<Vec<String>, ConfigError> {
  let invalid = |message: String| ConfigError::InvalidValue {
    path: path.to_path_buf(),
    key: key.to_string(),
    message,
  };

  let items = value
    .as_array()
    .ok_or_else(|| invalid(format!("expected an array, found {}", value.type_str())))?;

  items
    .iter()
    .map(|item| {
      item
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| invalid(format!("expected strings, found {}", item.type_str())))
    })
    .collect()
}
