//! Environment passed to child build steps.
//!
//! Resolved variables (`ZCPREF`, `ZCHOST`, `ZCTOP` and the manifest's `[env]`
//! table) live in an explicit [`EnvironmentContext`] instead of being written
//! straight into the process environment. Build steps receive the exported
//! variables through `Command::envs`, and the CLI copies them into the real
//! process environment once, before any worker thread is started.
//!
//! # Expansion
//!
//! Values are expanded shell-style:
//!
//! - `$NAME` where `NAME` is a run of ASCII letters, digits and `_`
//! - `${NAME}` for any name up to the closing brace
//!
//! Unknown variables are left untouched, as is a `$` that does not start a
//! reference.

use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct EnvironmentContext {
  vars: HashMap<String, String>,
  /// Keys set through [`EnvironmentContext::set`], in first-set order.
  exported: Vec<String>,
}

impl EnvironmentContext {
  /// An empty context, seeing no inherited variables.
  pub fn new() -> Self {
    Self::default()
  }

  /// A context seeded with a snapshot of the current process environment.
  ///
  /// Variables whose name or value is not valid UTF-8 are skipped.
  pub fn from_process() -> Self {
    let vars = std::env::vars_os()
      .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
      .collect();
    Self {
      vars,
      exported: Vec::new(),
    }
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.vars.get(key).map(String::as_str)
  }

  /// Set a variable and mark it for export to child processes.
  pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
    let key = key.into();
    if !self.exported.contains(&key) {
      self.exported.push(key.clone());
    }
    self.vars.insert(key, value.into());
  }

  /// Expand `$VAR` and `${VAR}` references against this context.
  pub fn expand(&self, input: &str) -> String {
    expand_vars(input, |name| self.get(name).map(str::to_owned))
  }

  /// Variables set on this context, in the order they were first set.
  pub fn exported(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .exported
      .iter()
      .filter_map(|k| self.vars.get(k).map(|v| (k.as_str(), v.as_str())))
  }

  /// Copy the exported variables into the process environment.
  ///
  /// Must be called while the process is still single-threaded (before the
  /// async runtime is built).
  pub fn export_to_process(&self) {
    for (key, value) in self.exported() {
      // SAFETY: callers invoke this before spawning any thread, so no other
      // thread can be reading the environment concurrently.
      unsafe { std::env::set_var(key, value) };
    }
  }
}

/// Expand shell-style variable references using `lookup`.
pub fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
  let mut out = String::with_capacity(input.len());
  let mut rest = input;

  while let Some(pos) = rest.find('$') {
    out.push_str(&rest[..pos]);
    let after = &rest[pos + 1..];

    if let Some(braced) = after.strip_prefix('{') {
      match braced.find('}') {
        Some(end) => {
          let name = &braced[..end];
          match lookup(name) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[pos..pos + end + 3]),
          }
          rest = &braced[end + 1..];
        }
        None => {
          out.push('$');
          rest = after;
        }
      }
      continue;
    }

    let len = after
      .bytes()
      .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
      .count();
    if len == 0 {
      out.push('$');
      rest = after;
      continue;
    }

    let name = &after[..len];
    match lookup(name) {
      Some(value) => out.push_str(&value),
      None => out.push_str(&rest[pos..pos + len + 1]),
    }
    rest = &after[len..];
  }

  out.push_str(rest);
  out
}

/// Render a path with forward slashes and without a Windows verbatim prefix.
pub fn to_posix(path: &Path) -> String {
  let simplified = dunce::simplified(path).to_string_lossy();
  if cfg!(windows) {
    simplified.replace('\\', "/")
  } else {
    simplified.into_owned()
  }
}
