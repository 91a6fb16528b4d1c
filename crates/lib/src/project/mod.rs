//! The per-project build collaborator.
//!
//! The orchestrator only knows a project through [`Project`]: its name, the
//! other projects it requires, and an async build step. A [`ProjectLoader`]
//! turns a mapped directory into a `Project`. The default loader,
//! [`ScriptLoader`], reads `conf.toml` and runs `build.sh`.

mod script;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::build::BuildError;
use crate::config::BuildSettings;
use crate::env::EnvironmentContext;
use crate::ledger::DependencyLedger;
use crate::warning::WarningPolicy;

pub use script::{ProjectConf, ScriptLoader, ScriptProject};

/// Everything a build step may read from the orchestrator.
#[derive(Debug, Clone)]
pub struct BuildContext {
  settings: Arc<BuildSettings>,
  warner: Arc<WarningPolicy>,
  ledger: Arc<DependencyLedger>,
  env: Arc<EnvironmentContext>,
}

impl BuildContext {
  pub fn new(
    settings: Arc<BuildSettings>,
    warner: Arc<WarningPolicy>,
    ledger: Arc<DependencyLedger>,
    env: Arc<EnvironmentContext>,
  ) -> Self {
    Self {
      settings,
      warner,
      ledger,
      env,
    }
  }

  pub fn settings(&self) -> &BuildSettings {
    &self.settings
  }

  pub fn warner(&self) -> &WarningPolicy {
    &self.warner
  }

  pub fn ledger(&self) -> &DependencyLedger {
    &self.ledger
  }

  /// Owned ledger handle, for moving into `spawn_blocking`.
  pub fn ledger_handle(&self) -> Arc<DependencyLedger> {
    Arc::clone(&self.ledger)
  }

  pub fn env(&self) -> &EnvironmentContext {
    &self.env
  }
}

/// One buildable unit.
#[async_trait]
pub trait Project: Send + Sync {
  fn name(&self) -> &str;

  /// Projects that must finish building before this one starts.
  fn requirements(&self) -> &[String] {
    &[]
  }

  /// Run the build step.
  async fn build(&self, ctx: &BuildContext) -> Result<(), BuildError>;
}

/// Creates [`Project`]s from mapped directories.
pub trait ProjectLoader: Send + Sync {
  fn load(&self, name: &str, dir: &Path, ctx: &BuildContext) -> Result<Box<dyn Project>, BuildError>;
}
