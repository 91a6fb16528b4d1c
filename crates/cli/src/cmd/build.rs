//! Implementation of the `zcbe build` command.
//!
//! Sets up the build session synchronously (build-tool prompts may block on
//! the terminal), exports the build environment, then drives the
//! orchestrator on a tokio runtime.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use zcbe_lib::{BuildOptions, Orchestrator, WarningPolicy};

use super::{SessionArgs, fatal_exit};
use crate::output::{format_duration, print_error, print_info, print_stat, print_success, print_warning};

#[derive(Args, Debug, Default)]
pub struct BuildArgs {
  /// Projects to build
  #[arg(value_name = "PROJECT")]
  pub projects: Vec<String>,

  /// Build every project in the mapping
  #[arg(short, long, conflicts_with = "projects")]
  pub all: bool,

  /// Maximum number of build scripts running at once
  #[arg(short, long, value_name = "N")]
  pub jobs: Option<usize>,

  /// Rebuild projects that are already built
  #[arg(short = 'f', long)]
  pub rebuild: bool,

  /// Show what would be built without running build scripts
  #[arg(short = 'n', long)]
  pub dry_run: bool,

  /// Append build script stdout to FILE
  #[arg(short = 'o', long, value_name = "FILE")]
  pub stdout: Option<PathBuf>,

  /// Append build script stderr to FILE
  #[arg(short = 'e', long, value_name = "FILE")]
  pub stderr: Option<PathBuf>,

  #[command(flatten)]
  pub session: SessionArgs,
}

impl BuildArgs {
  fn options(&self) -> BuildOptions {
    BuildOptions {
      rebuild: self.rebuild,
      dry_run: self.dry_run,
      stdout: self.stdout.clone(),
      stderr: self.stderr.clone(),
      max_jobs: self.jobs,
      ..self.session.options()
    }
  }
}

pub fn cmd_build(build_dir: &Path, args: BuildArgs, warner: Arc<WarningPolicy>) -> Result<ExitCode> {
  if !args.all && args.projects.is_empty() {
    print_info("Nothing to build. Name some projects or pass --all.");
    return Ok(ExitCode::SUCCESS);
  }

  let options = args.options();
  let orch = Orchestrator::new(build_dir, &options, warner).context("Failed to set up build session")?;
  orch.env().export_to_process();

  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = if args.all {
    rt.block_on(orch.build_all_report()).context("Failed to read project mapping")?
  } else {
    rt.block_on(orch.build_many_report(&args.projects))
  };
  let elapsed = started.elapsed();
  info!(elapsed_ms = elapsed.as_millis() as u64, "build finished");

  for (name, err) in &report.failed {
    print_error(&format!("{}: {}", name, err));
  }

  if report.fatal_warning().is_some() {
    return Ok(fatal_exit());
  }
  if !report.is_success() {
    print_stat("Built", &report.succeeded.len().to_string());
    print_stat("Failed", &report.failed.len().to_string());
    return Ok(ExitCode::FAILURE);
  }

  if options.dry_run {
    print_warning("Dry run: no build scripts were run");
  }
  print_success(&format!(
    "{} built {} project(s) in {}",
    orch.settings().build_name,
    report.succeeded.len(),
    format_duration(elapsed)
  ));
  Ok(ExitCode::SUCCESS)
}
