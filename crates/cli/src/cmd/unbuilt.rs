//! Implementation of the `zcbe unbuilt` command.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use zcbe_lib::{Orchestrator, WarningPolicy};

use super::SessionArgs;
use crate::output::print_success;

/// Print every mapped project the ledger does not mark as built, one per
/// line. Exits with status 1 when there is at least one.
pub fn cmd_unbuilt(build_dir: &Path, args: SessionArgs, warner: Arc<WarningPolicy>) -> Result<ExitCode> {
  let orch = Orchestrator::new(build_dir, &args.options(), warner).context("Failed to set up build session")?;

  if orch.show_unbuilt().context("Failed to read project mapping")? {
    return Ok(ExitCode::FAILURE);
  }

  print_success("All projects are built");
  Ok(ExitCode::SUCCESS)
}
