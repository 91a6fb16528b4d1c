mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use zcbe_lib::WarningPolicy;

use cmd::{BuildArgs, SessionArgs};

/// zcbe - The Z cross-compile build environment
#[derive(Parser)]
#[command(name = "zcbe")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Build root containing build.toml
  #[arg(short = 'C', long = "chdir", value_name = "DIR", default_value = ".", global = true)]
  build_dir: PathBuf,

  /// Silence all warnings
  #[arg(short = 'w', global = true)]
  silent: bool,

  /// Warning option: error, all, <category> or no-<category>
  #[arg(short = 'W', value_name = "OPT", global = true)]
  warnings: Vec<String>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build projects and the projects they require
  Build(BuildArgs),

  /// List mapped projects that have not been built yet
  Unbuilt(SessionArgs),

  /// List warning categories
  Warnings,
}

impl Cli {
  fn warning_policy(&self) -> WarningPolicy {
    let mut policy = WarningPolicy::with_defaults();
    for flag in &self.warnings {
      policy.apply_flag(flag);
    }
    if self.silent {
      policy.silence();
    }
    policy
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "info" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let warner = Arc::new(cli.warning_policy());

  let result = match cli.command {
    Commands::Build(args) => cmd::cmd_build(&cli.build_dir, args, warner),
    Commands::Unbuilt(args) => cmd::cmd_unbuilt(&cli.build_dir, args, warner),
    Commands::Warnings => cmd::cmd_warnings(&warner),
  };

  match result {
    Ok(code) => code,
    Err(e) => {
      output::print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
