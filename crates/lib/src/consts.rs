//! File names and environment variable names shared across the crate.

/// Top-level build manifest, found in the build root.
pub const BUILD_TOML: &str = "build.toml";

/// Default project-name-to-path mapping file, relative to the build root.
pub const DEFAULT_MAPPING_TOML: &str = "mapping.toml";

/// Dependency ledger, relative to the install prefix.
pub const LEDGER_FILENAME: &str = "zcbe.recipe";

/// Per-project configuration file.
pub const PROJECT_CONF: &str = "conf.toml";

/// Per-project build script.
pub const PROJECT_SCRIPT: &str = "build.sh";

pub const ENV_PREFIX: &str = "ZCPREF";
pub const ENV_HOST: &str = "ZCHOST";
pub const ENV_TOP: &str = "ZCTOP";
