//! Persistent dependency ledger.
//!
//! Records which build tools and which projects are known to be satisfied,
//! so later runs skip the questions and the rebuilds.
//!
//! # Storage
//!
//! A single JSON file, `<prefix>/zcbe.recipe`:
//!
//! ```json
//! {"build": {"make": true}, "req": {"zlib": true}}
//! ```
//!
//! Entries are only ever added. Every [`DependencyLedger::add`] re-reads the
//! file, sets the entry and writes the whole file back atomically, all under
//! one mutex, so concurrent builds in this process never lose each other's
//! entries.
//!
//! # Build tools
//!
//! An unknown `build` entry is resolved through the ledger's
//! [`ConfirmationProvider`] and recorded once confirmed. Interactive prompts
//! block the calling thread; callers on an async runtime should go through
//! `spawn_blocking`.

mod confirm;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

pub use confirm::{Confirmation, ConfirmationProvider};

/// `kind -> name -> satisfied`
type LedgerData = BTreeMap<String, BTreeMap<String, bool>>;

/// What a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepKind {
  /// A project that finished building.
  Req,
  /// A build tool confirmed present on the host.
  Build,
}

impl DepKind {
  pub fn as_str(self) -> &'static str {
    match self {
      DepKind::Req => "req",
      DepKind::Build => "build",
    }
  }
}

impl fmt::Display for DepKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
pub enum LedgerError {
  #[error("failed to read ledger {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write ledger {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("ledger {path} is corrupt: {source}")]
  Corrupt {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize ledger: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("build tool `{tool}` is not available")]
  Declined { tool: String },

  #[error("cannot confirm build tool `{tool}` in non-interactive mode. Use --assume-yes to proceed.")]
  NonInteractive { tool: String },

  #[error("confirmation prompt failed: {0}")]
  Prompt(#[source] io::Error),
}

pub struct DependencyLedger {
  path: PathBuf,
  entries: Mutex<LedgerData>,
  /// Serializes confirmation rounds so a tool is asked about once.
  prompt_lock: Mutex<()>,
  confirm: ConfirmationProvider,
}

impl fmt::Debug for DependencyLedger {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DependencyLedger")
      .field("path", &self.path)
      .field("confirm", &self.confirm)
      .finish_non_exhaustive()
  }
}

impl DependencyLedger {
  /// Open the ledger at `path`, creating an empty one if missing.
  pub fn open(path: impl Into<PathBuf>, confirm: ConfirmationProvider) -> Result<Self, LedgerError> {
    let path = path.into();

    if !path.exists() {
      debug!(path = %path.display(), "creating empty ledger");
      fs::write(&path, "{}").map_err(|source| LedgerError::Write {
        path: path.clone(),
        source,
      })?;
    }

    let entries = read_data(&path)?;

    Ok(Self {
      path,
      entries: Mutex::new(entries),
      prompt_lock: Mutex::new(()),
      confirm,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Whether `(kind, name)` is recorded as satisfied. Never prompts.
  pub fn is_satisfied(&self, kind: DepKind, name: &str) -> bool {
    lock(&self.entries)
      .get(kind.as_str())
      .and_then(|names| names.get(name))
      .copied()
      .unwrap_or(false)
  }

  /// Check `(kind, name)`.
  ///
  /// For [`DepKind::Req`] this is a plain lookup. For [`DepKind::Build`] an
  /// unknown tool is confirmed through the provider and then recorded; a
  /// declined tool is [`LedgerError::Declined`].
  pub fn check(&self, kind: DepKind, name: &str) -> Result<bool, LedgerError> {
    if self.is_satisfied(kind, name) {
      return Ok(true);
    }

    match kind {
      DepKind::Req => Ok(false),
      DepKind::Build => self.confirm_tool(name),
    }
  }

  fn confirm_tool(&self, tool: &str) -> Result<bool, LedgerError> {
    let _guard = lock(&self.prompt_lock);

    // Another caller may have confirmed it while we waited.
    if self.is_satisfied(DepKind::Build, tool) {
      return Ok(true);
    }

    loop {
      match self.confirm.ask(tool)? {
        Confirmation::Confirmed => break,
        Confirmation::Pending => continue,
        Confirmation::Declined => return Err(LedgerError::Declined { tool: tool.to_string() }),
      }
    }

    info!(tool = %tool, "build tool confirmed");
    self.add(DepKind::Build, tool)?;
    Ok(true)
  }

  /// Record `(kind, name)` as satisfied and persist the ledger.
  pub fn add(&self, kind: DepKind, name: &str) -> Result<(), LedgerError> {
    let mut entries = lock(&self.entries);

    let mut data = if self.path.exists() {
      read_data(&self.path)?
    } else {
      LedgerData::new()
    };
    data
      .entry(kind.as_str().to_string())
      .or_default()
      .insert(name.to_string(), true);

    write_data(&self.path, &data)?;
    debug!(kind = %kind, name = %name, "ledger entry recorded");

    *entries = data;
    Ok(())
  }

  /// Names recorded as satisfied for `kind`, sorted.
  pub fn satisfied(&self, kind: DepKind) -> Vec<String> {
    lock(&self.entries)
      .get(kind.as_str())
      .map(|names| {
        names
          .iter()
          .filter(|(_, ok)| **ok)
          .map(|(name, _)| name.clone())
          .collect()
      })
      .unwrap_or_default()
  }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_data(path: &Path) -> Result<LedgerData, LedgerError> {
  let content = fs::read_to_string(path).map_err(|source| LedgerError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  serde_json::from_str(&content).map_err(|source| LedgerError::Corrupt {
    path: path.to_path_buf(),
    source,
  })
}

/// Write to a sibling temp file, then rename over the ledger.
fn write_data(path: &Path, data: &LedgerData) -> Result<(), LedgerError> {
  let content = serde_json::to_string_pretty(data).map_err(LedgerError::Serialize)?;
  let mut temp_name = path.as_os_str().to_owned();
  temp_name.push(".tmp");
  let temp_path = PathBuf::from(temp_name);

  let write_err = |source: io::Error| LedgerError::Write {
    path: path.to_path_buf(),
    source,
  };
  fs::write(&temp_path, content).map_err(write_err)?;
  fs::rename(&temp_path, path).map_err(write_err)?;
  Ok(())
}
