mod build;
mod unbuilt;
mod warnings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;

use zcbe_lib::BuildOptions;

pub use build::{BuildArgs, cmd_build};
pub use unbuilt::cmd_unbuilt;
pub use warnings::cmd_warnings;

/// Exit status when a warning was promoted by `-Werror`.
pub const EXIT_FATAL_WARNING: u8 = 2;

/// Overrides shared by every command that opens a build session.
#[derive(Args, Debug, Default)]
pub struct SessionArgs {
  /// Override info.build-name
  #[arg(short = 'B', long = "build-name", value_name = "NAME")]
  pub build_name: Option<String>,

  /// Override info.prefix
  #[arg(short = 'p', long, value_name = "PREFIX")]
  pub prefix: Option<PathBuf>,

  /// Override info.hostname
  #[arg(short = 'H', long = "target-triplet", value_name = "TRIPLET")]
  pub triplet: Option<String>,

  /// Assume build tools are installed instead of asking
  #[arg(short = 'y', long = "assume-yes")]
  pub assume_yes: bool,
}

impl SessionArgs {
  pub fn options(&self) -> BuildOptions {
    BuildOptions {
      build_name: self.build_name.clone(),
      prefix: self.prefix.clone(),
      triplet: self.triplet.clone(),
      assume_yes: self.assume_yes,
      ..BuildOptions::default()
    }
  }
}

pub fn fatal_exit() -> ExitCode {
  ExitCode::from(EXIT_FATAL_WARNING)
}
