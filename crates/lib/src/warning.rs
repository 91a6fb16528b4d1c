//! Categorized warnings.
//!
//! Every warning belongs to a named category that can be switched on or off
//! (`-W<category>` / `-Wno-<category>`). Two pseudo-options sit beside the
//! categories: `all` shows every category, and `error` promotes any shown
//! warning to a [`FatalWarning`]. [`WarningPolicy::silence`] mutes
//! everything for the rest of the process.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

pub const OPT_ALL: &str = "all";
pub const OPT_ERROR: &str = "error";

pub const GENERIC: &str = "generic";
pub const NAME_MISMATCH: &str = "name-mismatch";
pub const DRY_RUN: &str = "dry-run";

/// Known categories and what they report.
pub const CATEGORIES: &[(&str, &str)] = &[
  (GENERIC, "Generic warnings"),
  (NAME_MISMATCH, "Project name in conf.toml differs from its mapping name"),
  (DRY_RUN, "A build step was skipped because of --dry-run"),
];

/// Categories shown unless switched off.
pub const DEFAULT_ENABLED: &[&str] = &[GENERIC, NAME_MISMATCH];

/// A warning shown while `-Werror` is in effect.
///
/// The caller decides how to stop; the CLI exits with status 2.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} [-W{category}] (promoted by -Werror)")]
pub struct FatalWarning {
  pub category: String,
  pub message: String,
}

#[derive(Debug)]
pub struct WarningPolicy {
  options: BTreeMap<String, bool>,
  silent: AtomicBool,
}

impl Default for WarningPolicy {
  fn default() -> Self {
    let options = BTreeMap::from([(OPT_ALL.to_string(), true), (OPT_ERROR.to_string(), false)]);
    Self {
      options,
      silent: AtomicBool::new(false),
    }
  }
}

impl WarningPolicy {
  pub fn new() -> Self {
    Self::default()
  }

  /// A policy seeded with [`CATEGORIES`] and [`DEFAULT_ENABLED`].
  pub fn with_defaults() -> Self {
    let mut policy = Self::new();
    policy.load_defaults(CATEGORIES.iter().map(|(name, _)| *name), DEFAULT_ENABLED.iter().copied());
    policy
  }

  /// Merge `options` into the current state.
  pub fn configure<K: Into<String>>(&mut self, options: impl IntoIterator<Item = (K, bool)>) {
    self.options.extend(options.into_iter().map(|(k, v)| (k.into(), v)));
  }

  /// Apply a `-W` flag: `name` enables, `no-name` disables.
  pub fn apply_flag(&mut self, flag: &str) {
    match flag.strip_prefix("no-") {
      Some(name) => self.configure([(name, false)]),
      None => self.configure([(flag, true)]),
    }
  }

  /// Disable every category in `all_categories`, then enable
  /// `enabled_by_default`.
  ///
  /// Also switches `all` off so the seeded map decides what is shown.
  pub fn load_defaults<'a>(
    &mut self,
    all_categories: impl IntoIterator<Item = &'a str>,
    enabled_by_default: impl IntoIterator<Item = &'a str>,
  ) {
    self.options.insert(OPT_ALL.to_string(), false);
    for name in all_categories {
      self.options.insert(name.to_string(), false);
    }
    for name in enabled_by_default {
      self.options.insert(name.to_string(), true);
    }
  }

  /// Mute all warnings for the rest of the process. Cannot be undone.
  pub fn silence(&self) {
    self.silent.store(true, Ordering::Relaxed);
  }

  pub fn is_silent(&self) -> bool {
    self.silent.load(Ordering::Relaxed)
  }

  /// Whether shown warnings are promoted to errors.
  pub fn is_error(&self) -> bool {
    self.option(OPT_ERROR)
  }

  pub fn should_warn(&self, category: &str) -> bool {
    (self.option(OPT_ALL) || self.option(category)) && !self.is_silent()
  }

  /// The line `warn` would print, if the category is shown.
  pub fn render(&self, category: &str, message: &str) -> Option<String> {
    if !self.should_warn(category) {
      return None;
    }
    let label = if self.is_error() { "Error" } else { "Warning" };
    Some(format!("{label}: {message} [-W{category}]"))
  }

  /// Print a warning to stderr if `category` is shown.
  ///
  /// Under `-Werror` a shown warning also prints `exiting [-Werror]` and
  /// returns [`FatalWarning`]; the caller is expected to stop the run.
  pub fn warn(&self, category: &str, message: impl AsRef<str>) -> Result<(), FatalWarning> {
    let message = message.as_ref();
    let Some(line) = self.render(category, message) else {
      return Ok(());
    };
    eprintln!("{line}");

    if self.is_error() {
      eprintln!("exiting [-Werror]");
      return Err(FatalWarning {
        category: category.to_string(),
        message: message.to_string(),
      });
    }
    Ok(())
  }

  fn option(&self, name: &str) -> bool {
    self.options.get(name).copied().unwrap_or(false)
  }
}
