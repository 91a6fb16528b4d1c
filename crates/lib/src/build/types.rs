//! Error, handle and report types for orchestrated builds.

use std::fmt;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, Shared};
use thiserror::Error;

use crate::config::ConfigError;
use crate::ledger::LedgerError;
use crate::mapping::MappingError;
use crate::warning::FatalWarning;

/// Why a single project failed to build.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Mapping(#[from] MappingError),

  #[error(transparent)]
  Ledger(#[from] LedgerError),

  #[error(transparent)]
  Warning(#[from] FatalWarning),

  #[error("invalid project {name}: {message}")]
  InvalidProject { name: String, message: String },

  #[error("{project}: build script not found at {}", .path.display())]
  MissingScript { project: String, path: PathBuf },

  #[error("{project}: build script failed with exit code {code:?}")]
  Script { project: String, code: Option<i32> },

  /// A required project failed; this one never started.
  #[error("dependency {dependency} failed: {source}")]
  Dependency {
    dependency: String,
    #[source]
    source: Arc<BuildError>,
  },

  /// Projects that require each other, in wait order.
  #[error("dependency cycle: {}", .0.join(" -> "))]
  Cycle(Vec<String>),

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  #[error("build task panicked: {0}")]
  Panicked(String),

  #[error("build task was cancelled")]
  Cancelled,
}

impl BuildError {
  /// The promoted warning behind this failure, if any, following failed
  /// dependencies.
  pub fn fatal_warning(&self) -> Option<&FatalWarning> {
    match self {
      BuildError::Warning(warning) => Some(warning),
      BuildError::Dependency { source, .. } => source.fatal_warning(),
      _ => None,
    }
  }
}

/// Construction failures of the [`Orchestrator`](super::Orchestrator).
#[derive(Debug, Error)]
pub enum OrchestratorError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Ledger(#[from] LedgerError),
}

/// Outcome of a batch build. Failed projects keep their error.
#[derive(Debug, Default, Clone)]
pub struct BatchReport {
  pub succeeded: Vec<String>,
  pub failed: Vec<(String, Arc<BuildError>)>,
}

impl BatchReport {
  pub fn is_success(&self) -> bool {
    self.failed.is_empty()
  }

  pub fn total(&self) -> usize {
    self.succeeded.len() + self.failed.len()
  }

  /// The first promoted warning among the failures.
  pub fn fatal_warning(&self) -> Option<&FatalWarning> {
    self.failed.iter().find_map(|(_, err)| err.fatal_warning())
  }
}

pub(crate) type SharedBuild = Shared<BoxFuture<'static, Result<(), Arc<BuildError>>>>;

/// A cloneable, awaitable handle to one project's build.
///
/// Every clone resolves to the same outcome; the build itself runs once.
#[derive(Clone)]
pub struct BuildHandle {
  name: Arc<str>,
  inner: SharedBuild,
}

impl BuildHandle {
  pub(crate) fn new(name: &str, inner: SharedBuild) -> Self {
    Self {
      name: Arc::from(name),
      inner,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// The outcome, if the build already finished.
  pub fn peek(&self) -> Option<&Result<(), Arc<BuildError>>> {
    self.inner.peek()
  }
}

impl fmt::Debug for BuildHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BuildHandle")
      .field("name", &self.name)
      .field("finished", &self.inner.peek().is_some())
      .finish()
  }
}

impl Future for BuildHandle {
  type Output = Result<(), Arc<BuildError>>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut self.inner).poll(cx)
  }
}
