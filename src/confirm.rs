//! Confirmation capability
//!
//! Destructive operations ask for confirmation through this trait so the
//! removal logic stays testable without a real terminal.

use std::io::{self, Write};

/// Provider of yes/no confirmations
pub trait Confirmation: Send + Sync {
    /// Ask the operator. Only the exact tokens `y`/`yes`
    /// (case-insensitive) count as approval.
    fn confirm(&self, prompt: &str) -> io::Result<bool>;
}

/// Interactive confirmation on the controlling terminal
pub struct TerminalConfirmation;

impl Confirmation for TerminalConfirmation {
    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        print!("{prompt} [y/N]: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(is_affirmative(&input))
    }
}

/// Pre-supplied answer, used by `--yes` and by tests
pub struct PresetConfirmation(pub bool);

impl Confirmation for PresetConfirmation {
    fn confirm(&self, _prompt: &str) -> io::Result<bool> {
        Ok(self.0)
    }
}

fn is_affirmative(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
