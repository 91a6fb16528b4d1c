//! The build orchestrator.
//!
//! An [`Orchestrator`] owns one build session: resolved settings, the
//! environment handed to build steps, the dependency ledger and the warning
//! policy. Each project build runs as its own tokio task behind a shared
//! [`BuildHandle`], so a project is built at most once per orchestrator no
//! matter how many callers or dependents ask for it.
//!
//! A project's required projects are awaited before it takes a job permit,
//! which keeps a small `max_jobs` from deadlocking on a deep chain. Builds
//! that wait on each other are tracked in a wait-for graph; closing a loop
//! fails with [`BuildError::Cycle`] instead of hanging.
//!
//! A promoted warning halts the session: once any build fails with a
//! [`FatalWarning`](crate::warning::FatalWarning), every build that has not
//! yet started its build step fails with [`BuildError::Cancelled`].

mod types;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::config::{self, BuildOptions, BuildSettings};
use crate::env::EnvironmentContext;
use crate::ledger::{ConfirmationProvider, DepKind, DependencyLedger, lock};
use crate::mapping::{Mapping, MappingError};
use crate::project::{BuildContext, Project, ProjectLoader, ScriptLoader};
use crate::warning::WarningPolicy;

pub use types::{BatchReport, BuildError, BuildHandle, OrchestratorError};

#[derive(Default)]
struct Registry {
  builds: HashMap<String, BuildHandle>,
  /// `waiter -> projects it is currently awaiting`.
  waits: HashMap<String, HashSet<String>>,
}

impl Registry {
  /// A chain of wait-for edges leading from `from` to `to`, inclusive.
  fn wait_path(&self, from: &str, to: &str, seen: &mut HashSet<String>) -> Option<Vec<String>> {
    if from == to {
      return Some(vec![to.to_string()]);
    }
    if !seen.insert(from.to_string()) {
      return None;
    }
    for next in self.waits.get(from).into_iter().flatten() {
      if let Some(mut path) = self.wait_path(next, to, seen) {
        path.insert(0, from.to_string());
        return Some(path);
      }
    }
    None
  }
}

pub struct Orchestrator {
  context: BuildContext,
  loader: Arc<dyn ProjectLoader>,
  jobs: Option<Arc<Semaphore>>,
  registry: Mutex<Registry>,
  halted: AtomicBool,
}

impl std::fmt::Debug for Orchestrator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Orchestrator")
      .field("context", &self.context)
      .field("max_jobs", &self.context.settings().max_jobs)
      .finish_non_exhaustive()
  }
}

impl Orchestrator {
  /// Set up a session for the build root `build_dir`, building projects
  /// with [`ScriptLoader`].
  ///
  /// Build tools are confirmed on the terminal unless `options.assume_yes`
  /// is set.
  pub fn new(
    build_dir: impl AsRef<Path>,
    options: &BuildOptions,
    warner: Arc<WarningPolicy>,
  ) -> Result<Arc<Self>, OrchestratorError> {
    let confirm = ConfirmationProvider::from_assume_yes(options.assume_yes);
    Self::with_loader(build_dir, options, warner, confirm, Arc::new(ScriptLoader))
  }

  /// Like [`Orchestrator::new`], with an explicit confirmation source and
  /// project loader.
  ///
  /// Loads and validates `build.toml`, computes the build environment, opens
  /// the ledger under the prefix and confirms every global build tool. This
  /// may block on a terminal prompt, so call it outside the async runtime
  /// when `confirm` is interactive.
  pub fn with_loader(
    build_dir: impl AsRef<Path>,
    options: &BuildOptions,
    warner: Arc<WarningPolicy>,
    confirm: ConfirmationProvider,
    loader: Arc<dyn ProjectLoader>,
  ) -> Result<Arc<Self>, OrchestratorError> {
    let settings = config::load(build_dir.as_ref(), options)?;
    config::validate(&settings)?;

    let mut env = EnvironmentContext::from_process();
    config::apply_environment(&settings, &mut env);

    let ledger = DependencyLedger::open(settings.ledger_path(), confirm)?;
    for tool in &settings.build_deps {
      ledger.check(DepKind::Build, tool)?;
    }

    let jobs = settings.max_jobs.map(|n| Arc::new(Semaphore::new(n)));

    info!(
      build = %settings.build_name,
      prefix = %settings.prefix.display(),
      host = %settings.triplet,
      "build session ready"
    );

    let context = BuildContext::new(Arc::new(settings), warner, Arc::new(ledger), Arc::new(env));
    Ok(Arc::new(Self {
      context,
      loader,
      jobs,
      registry: Mutex::new(Registry::default()),
      halted: AtomicBool::new(false),
    }))
  }

  pub fn settings(&self) -> &BuildSettings {
    self.context.settings()
  }

  pub fn warner(&self) -> &WarningPolicy {
    self.context.warner()
  }

  pub fn ledger(&self) -> &DependencyLedger {
    self.context.ledger()
  }

  pub fn env(&self) -> &EnvironmentContext {
    self.context.env()
  }

  pub fn context(&self) -> &BuildContext {
    &self.context
  }

  /// Directory of project `name`. Re-reads the mapping on every call.
  pub fn project_path(&self, name: &str) -> Result<PathBuf, MappingError> {
    let settings = self.settings();
    Mapping::load(&settings.mapping_toml_path)?.resolve(&settings.build_dir, name)
  }

  pub fn project(&self, name: &str) -> Result<Box<dyn Project>, BuildError> {
    let dir = self.project_path(name)?;
    self.loader.load(name, &dir, &self.context)
  }

  /// Start building `name`, or join the build already under way.
  ///
  /// Must be called from within a tokio runtime.
  pub fn build(self: &Arc<Self>, name: &str) -> BuildHandle {
    let mut registry = lock(&self.registry);
    if let Some(handle) = registry.builds.get(name) {
      debug!(project = %name, "joining existing build");
      return handle.clone();
    }

    let this = Arc::clone(self);
    let owned = name.to_string();
    let task = tokio::spawn(async move { this.run(&owned).await });

    let shared = async move {
      match task.await {
        Ok(result) => result.map_err(Arc::new),
        Err(err) => Err(Arc::new(join_error(err))),
      }
    }
    .boxed()
    .shared();

    let handle = BuildHandle::new(name, shared);
    registry.builds.insert(name.to_string(), handle.clone());
    handle
  }

  /// Whether a promoted warning has stopped this session.
  pub fn is_halted(&self) -> bool {
    self.halted.load(Ordering::SeqCst)
  }

  async fn run(self: &Arc<Self>, name: &str) -> Result<(), BuildError> {
    let result = self.run_project(name).await;
    if let Err(err) = &result
      && let Some(warning) = err.fatal_warning()
      && !self.halted.swap(true, Ordering::SeqCst)
    {
      warn!(project = %name, category = %warning.category, "fatal warning, halting remaining builds");
    }
    result
  }

  async fn run_project(self: &Arc<Self>, name: &str) -> Result<(), BuildError> {
    self.ensure_running(name)?;
    let project = self.project(name)?;
    self.await_requirements(name, project.requirements()).await?;
    self.ensure_running(name)?;

    let _permit = match &self.jobs {
      Some(jobs) => Some(Arc::clone(jobs).acquire_owned().await.map_err(|_| BuildError::Cancelled)?),
      None => None,
    };
    self.ensure_running(name)?;

    info!(project = %name, "building");
    project.build(&self.context).await
  }

  fn ensure_running(&self, name: &str) -> Result<(), BuildError> {
    if self.is_halted() {
      debug!(project = %name, "skipping build, session halted");
      return Err(BuildError::Cancelled);
    }
    Ok(())
  }

  async fn await_requirements(self: &Arc<Self>, name: &str, requirements: &[String]) -> Result<(), BuildError> {
    if requirements.is_empty() {
      return Ok(());
    }

    {
      let mut registry = lock(&self.registry);
      for dep in requirements {
        if let Some(path) = registry.wait_path(dep, name, &mut HashSet::new()) {
          registry.waits.remove(name);
          let mut cycle = vec![name.to_string()];
          cycle.extend(path);
          return Err(BuildError::Cycle(cycle));
        }
        registry
          .waits
          .entry(name.to_string())
          .or_default()
          .insert(dep.clone());
      }
    }

    debug!(project = %name, requires = ?requirements, "waiting for required projects");
    let handles: Vec<BuildHandle> = requirements.iter().map(|dep| self.build(dep)).collect();
    let results = join_all(handles).await;
    lock(&self.registry).waits.remove(name);

    for (dep, result) in requirements.iter().zip(results) {
      result.map_err(|source| BuildError::Dependency {
        dependency: dep.clone(),
        source,
      })?;
    }
    Ok(())
  }

  /// Build every project in `names` and wait for all of them.
  ///
  /// One failure does not stop the others. Duplicate names are built once.
  pub async fn build_many_report<I, S>(self: &Arc<Self>, names: I) -> BatchReport
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut seen = HashSet::new();
    let names: Vec<String> = names
      .into_iter()
      .map(|name| name.as_ref().to_string())
      .filter(|name| seen.insert(name.clone()))
      .collect();

    let mut report = BatchReport::default();
    if names.is_empty() {
      return report;
    }

    info!(count = names.len(), "starting batch build");
    let handles: Vec<BuildHandle> = names.iter().map(|name| self.build(name)).collect();
    let results = join_all(handles).await;

    for (name, result) in names.into_iter().zip(results) {
      match result {
        Ok(()) => report.succeeded.push(name),
        Err(err) => {
          error!(project = %name, error = %err, "build failed");
          report.failed.push((name, err));
        }
      }
    }

    info!(
      succeeded = report.succeeded.len(),
      failed = report.failed.len(),
      "batch build complete"
    );
    report
  }

  /// [`build_many_report`](Self::build_many_report), printing each failure
  /// to stderr. `true` when every project built.
  pub async fn build_many<I, S>(self: &Arc<Self>, names: I) -> bool
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let report = self.build_many_report(names).await;
    for (name, err) in &report.failed {
      eprintln!("{}: {}", name, err);
    }
    report.is_success()
  }

  /// Build every mapped project, in mapping order.
  pub async fn build_all_report(self: &Arc<Self>) -> Result<BatchReport, MappingError> {
    let mapping = Mapping::load(&self.settings().mapping_toml_path)?;
    let names: Vec<String> = mapping.names().map(str::to_string).collect();
    Ok(self.build_many_report(names).await)
  }

  pub async fn build_all(self: &Arc<Self>) -> Result<bool, MappingError> {
    let mapping = Mapping::load(&self.settings().mapping_toml_path)?;
    let names: Vec<String> = mapping.names().map(str::to_string).collect();
    Ok(self.build_many(names).await)
  }

  /// Mapped projects the ledger does not mark as built, in mapping order.
  pub fn unbuilt_projects(&self) -> Result<Vec<String>, MappingError> {
    let mapping = Mapping::load(&self.settings().mapping_toml_path)?;
    Ok(
      mapping
        .names()
        .filter(|name| !self.ledger().is_satisfied(DepKind::Req, name))
        .map(str::to_string)
        .collect(),
    )
  }

  /// Print each unbuilt project to stdout. `true` if there was any.
  pub fn show_unbuilt(&self) -> Result<bool, MappingError> {
    let unbuilt = self.unbuilt_projects()?;
    for name in &unbuilt {
      println!("{}", name);
    }
    Ok(!unbuilt.is_empty())
  }
}

fn join_error(err: JoinError) -> BuildError {
  if !err.is_panic() {
    return BuildError::Cancelled;
  }
  let payload = err.into_panic();
  let message = payload
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| payload.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "unknown panic".to_string());
  BuildError::Panicked(message)
}
