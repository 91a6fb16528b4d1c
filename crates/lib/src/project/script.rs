//! Script-driven projects.
//!
//! A project directory holds a `conf.toml`:
//!
//! ```toml
//! [package]
//! name = "zlib"
//! version = "1.3"
//!
//! [deps]
//! build = ["make"]     # tools, confirmed through the ledger
//! req = ["binutils"]   # projects built first
//! ```
//!
//! and a `build.sh`, run with `sh -e` from the project directory.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use super::{BuildContext, Project, ProjectLoader};
use crate::build::BuildError;
use crate::consts::{PROJECT_CONF, PROJECT_SCRIPT};
use crate::ledger::DepKind;
use crate::warning::{DRY_RUN, NAME_MISMATCH};

/// Parsed `conf.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProjectConf {
  pub package: PackageInfo,
  #[serde(default)]
  pub deps: ProjectDeps,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PackageInfo {
  pub name: String,
  pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ProjectDeps {
  #[serde(default)]
  pub build: Vec<String>,
  #[serde(default)]
  pub req: Vec<String>,
}

impl ProjectConf {
  /// Read `conf.toml` from `dir`. `name` is the mapping name, for errors.
  pub fn load(name: &str, dir: &Path) -> Result<Self, BuildError> {
    let path = dir.join(PROJECT_CONF);
    let invalid = |message: String| BuildError::InvalidProject {
      name: name.to_string(),
      message,
    };

    let content = fs::read_to_string(&path).map_err(|e| invalid(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| invalid(format!("cannot parse {}: {}", path.display(), e)))
  }
}

/// Loads [`ScriptProject`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptLoader;

impl ProjectLoader for ScriptLoader {
  fn load(&self, name: &str, dir: &Path, ctx: &BuildContext) -> Result<Box<dyn Project>, BuildError> {
    let conf = ProjectConf::load(name, dir)?;

    if conf.package.name != name {
      ctx.warner().warn(
        NAME_MISMATCH,
        format!(
          "project \"{}\" calls itself \"{}\" in {}",
          name, conf.package.name, PROJECT_CONF
        ),
      )?;
    }

    debug!(
      project = %name,
      version = conf.package.version.as_deref().unwrap_or("unversioned"),
      requires = ?conf.deps.req,
      "loaded project"
    );

    Ok(Box::new(ScriptProject {
      name: name.to_string(),
      dir: dir.to_path_buf(),
      build_deps: conf.deps.build,
      requirements: conf.deps.req,
    }))
  }
}

#[derive(Debug, Clone)]
pub struct ScriptProject {
  name: String,
  dir: PathBuf,
  build_deps: Vec<String>,
  requirements: Vec<String>,
}

impl ScriptProject {
  pub fn dir(&self) -> &Path {
    &self.dir
  }

  async fn run_script(&self, ctx: &BuildContext) -> Result<(), BuildError> {
    let script = self.dir.join(PROJECT_SCRIPT);
    if !script.is_file() {
      return Err(BuildError::MissingScript {
        project: self.name.clone(),
        path: script,
      });
    }

    let settings = ctx.settings();
    let mut command = Command::new("sh");
    command
      .arg("-e")
      .arg(PROJECT_SCRIPT)
      .current_dir(&self.dir)
      .envs(ctx.env().exported());

    if let Some(path) = &settings.stdout {
      command.stdout(Stdio::from(open_log(path)?));
    }
    if let Some(path) = &settings.stderr {
      command.stderr(Stdio::from(open_log(path)?));
    }

    info!(project = %self.name, dir = %self.dir.display(), "running build script");
    let status = command.status().await?;

    if !status.success() {
      return Err(BuildError::Script {
        project: self.name.clone(),
        code: status.code(),
      });
    }
    Ok(())
  }
}

#[async_trait]
impl Project for ScriptProject {
  fn name(&self) -> &str {
    &self.name
  }

  fn requirements(&self) -> &[String] {
    &self.requirements
  }

  async fn build(&self, ctx: &BuildContext) -> Result<(), BuildError> {
    let settings = ctx.settings();

    if !settings.rebuild && ctx.ledger().is_satisfied(DepKind::Req, &self.name) {
      info!(project = %self.name, "already built, skipping");
      return Ok(());
    }

    for tool in &self.build_deps {
      let ledger = ctx.ledger_handle();
      let tool = tool.clone();
      tokio::task::spawn_blocking(move || ledger.check(DepKind::Build, &tool))
        .await
        .map_err(|e| BuildError::Panicked(e.to_string()))??;
    }

    if settings.dry_run {
      ctx
        .warner()
        .warn(DRY_RUN, format!("{}: dry run, not running {}", self.name, PROJECT_SCRIPT))?;
      return Ok(());
    }

    self.run_script(ctx).await?;
    let ledger = ctx.ledger_handle();
    let name = self.name.clone();
    tokio::task::spawn_blocking(move || ledger.add(DepKind::Req, &name))
      .await
      .map_err(|e| BuildError::Panicked(e.to_string()))??;
    info!(project = %self.name, "build succeeded");
    Ok(())
  }
}

fn open_log(path: &Path) -> Result<File, BuildError> {
  Ok(OpenOptions::new().create(true).append(true).open(path)?)
}
