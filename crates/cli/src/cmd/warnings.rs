//! Implementation of the `zcbe warnings` command.

use std::process::ExitCode;

use anyhow::Result;

use zcbe_lib::WarningPolicy;
use zcbe_lib::warning::CATEGORIES;

use crate::output::print_stat;

/// List the warning categories and whether the current flags show them.
pub fn cmd_warnings(warner: &WarningPolicy) -> Result<ExitCode> {
  println!("Warning categories:");
  for (name, description) in CATEGORIES {
    let state = if warner.should_warn(name) { "on" } else { "off" };
    print_stat(name, &format!("{} [{}]", description, state));
  }
  println!();
  println!("Use -W<category> to enable, -Wno-<category> to disable,");
  println!("-Wall to show every category and -Werror to make warnings fatal.");
  Ok(ExitCode::SUCCESS)
}
