//! zcbe-lib: core types and logic for the ZCBE build orchestrator
//!
//! This crate provides the pieces the `zcbe` binary drives:
//! - `config`: the `build.toml` manifest and the resolved `BuildSettings`
//! - `ledger`: the persistent record of satisfied dependencies
//! - `warning`: categorized diagnostics with `-Werror` promotion
//! - `project`: the per-project build collaborator
//! - `build`: the concurrent, deduplicating orchestrator

pub mod build;
pub mod config;
pub mod consts;
pub mod env;
pub mod ledger;
pub mod mapping;
pub mod project;
pub mod warning;

pub use build::{BatchReport, BuildError, BuildHandle, Orchestrator, OrchestratorError};
pub use config::{BuildOptions, BuildSettings, ConfigError};
pub use env::EnvironmentContext;
pub use ledger::{Confirmation, ConfirmationProvider, DepKind, DependencyLedger, LedgerError};
pub use mapping::{Mapping, MappingError};
pub use project::{BuildContext, Project, ProjectLoader};
pub use warning::{FatalWarning, WarningPolicy};
