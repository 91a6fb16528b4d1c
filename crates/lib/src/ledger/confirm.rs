//! Build-tool confirmation.
//!
//! The ledger cannot check whether a tool is really installed; it asks once
//! and records the answer. Where the answer comes from is a
//! [`ConfirmationProvider`].

use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Mutex;

use super::{LedgerError, lock};

/// Outcome of a single confirmation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
  /// The tool is present; record it.
  Confirmed,
  /// The tool is not available; stop.
  Declined,
  /// No decision yet; ask again.
  Pending,
}

#[derive(Debug)]
pub enum ConfirmationProvider {
  /// Prompt on the terminal. Blocks the calling thread.
  Interactive,
  /// Confirm everything.
  AssumeYes,
  /// Replay recorded answers; [`Confirmation::Declined`] once exhausted.
  Scripted(Mutex<VecDeque<Confirmation>>),
}

impl ConfirmationProvider {
  pub fn from_assume_yes(assume_yes: bool) -> Self {
    if assume_yes {
      ConfirmationProvider::AssumeYes
    } else {
      ConfirmationProvider::Interactive
    }
  }

  pub fn scripted(answers: impl IntoIterator<Item = Confirmation>) -> Self {
    ConfirmationProvider::Scripted(Mutex::new(answers.into_iter().collect()))
  }

  /// Run one confirmation round for `tool`.
  pub fn ask(&self, tool: &str) -> Result<Confirmation, LedgerError> {
    match self {
      ConfirmationProvider::AssumeYes => Ok(Confirmation::Confirmed),
      ConfirmationProvider::Scripted(answers) => Ok(lock(answers).pop_front().unwrap_or(Confirmation::Declined)),
      ConfirmationProvider::Interactive => {
        if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
          return Err(LedgerError::NonInteractive { tool: tool.to_string() });
        }
        let stdin = io::stdin();
        let mut input = stdin.lock();
        prompt_tool(tool, &mut input, &mut io::stderr()).map_err(LedgerError::Prompt)
      }
    }
  }
}

/// Ask whether `tool` is installed.
///
/// `y` confirms. `n` asks the operator to install the tool and returns
/// [`Confirmation::Pending`] once they press Enter. Anything else is rejected
/// and also yields `Pending`. End of input declines.
pub(crate) fn prompt_tool(tool: &str, input: &mut impl BufRead, output: &mut impl Write) -> io::Result<Confirmation> {
  write!(output, "Is build tool `{}` installed? [y/n] ", tool)?;
  output.flush()?;

  let mut answer = String::new();
  if input.read_line(&mut answer)? == 0 {
    return Ok(Confirmation::Declined);
  }

  match answer.trim().to_ascii_lowercase().as_str() {
    "y" | "yes" => Ok(Confirmation::Confirmed),
    "n" | "no" => {
      write!(output, "Please install `{}` and press Enter to continue...", tool)?;
      output.flush()?;
      answer.clear();
      if input.read_line(&mut answer)? == 0 {
        return Ok(Confirmation::Declined);
      }
      Ok(Confirmation::Pending)
    }
    _ => {
      writeln!(output, "Please answer 'y' or 'n'.")?;
      Ok(Confirmation::Pending)
    }
  }
}
