//! Project-name-to-path mapping.
//!
//! ```toml
//! [mapping]
//! zlib = "libs/zlib"
//! openssl = "libs/openssl"
//! ```
//!
//! Paths are relative to the build root. Project order follows the file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
  #[error("mapping file not found: {0}")]
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

  #[error("{0}: missing [mapping] section")]
  MissingSection(PathBuf),

  #[error("{path}: path for project \"{name}\" must be a string")]
  InvalidPath { path: PathBuf, name: String },

  #[error("project \"{0}\" not found")]
  UnknownProject(String),
}

/// A loaded `mapping.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
  projects: Vec<(String, PathBuf)>,
}

impl Mapping {
  /// Read and parse a mapping file.
  pub fn load(path: &Path) -> Result<Self, MappingError> {
    let content = fs::read_to_string(path).map_err(|e| {
      if e.kind() == io::ErrorKind::NotFound {
        MappingError::NotFound(path.to_path_buf())
      } else {
        MappingError::Read {
          path: path.to_path_buf(),
          source: e,
        }
      }
    })?;
    Self::parse(path, &content)
  }

  fn parse(path: &Path, content: &str) -> Result<Self, MappingError> {
    let mut doc: toml::Table = toml::from_str(content).map_err(|source| MappingError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    let table = match doc.remove("mapping") {
      Some(toml::Value::Table(table)) => table,
      _ => return Err(MappingError::MissingSection(path.to_path_buf())),
    };

    let projects = table
      .into_iter()
      .map(|(name, value)| match value {
        toml::Value::String(rel) => Ok((name, PathBuf::from(rel))),
        _ => Err(MappingError::InvalidPath {
          path: path.to_path_buf(),
          name,
        }),
      })
      .collect::<Result<_, _>>()?;

    Ok(Self { projects })
  }

  /// Relative path of `name`, if mapped.
  pub fn get(&self, name: &str) -> Option<&Path> {
    self
      .projects
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, p)| p.as_path())
  }

  /// Resolve `name` against `build_dir`.
  pub fn resolve(&self, build_dir: &Path, name: &str) -> Result<PathBuf, MappingError> {
    self
      .get(name)
      .map(|rel| build_dir.join(rel))
      .ok_or_else(|| MappingError::UnknownProject(name.to_string()))
  }

  /// Project names in file order.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.projects.iter().map(|(n, _)| n.as_str())
  }

  pub fn len(&self) -> usize {
    self.projects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.projects.is_empty()
  }
}
