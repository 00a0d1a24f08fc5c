//! Confirmation policy for destructive operator actions

use crate::error::{CliError, Result};
use inquire::InquireError;

/// Asks whether an action may proceed
pub trait Confirm {
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Always proceeds (`--yes`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Interactive yes/no prompt on the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptConfirm;

impl Confirm for PromptConfirm {
    fn confirm(&self, question: &str) -> Result<bool> {
        match inquire::Confirm::new(question).with_default(false).prompt() {
            Ok(answer) => Ok(answer),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(false),
            Err(InquireError::NotTTY) => Err(CliError::Prompt(
                "standard input is not a terminal".to_string(),
            )),
            Err(e) => Err(CliError::Prompt(e.to_string())),
        }
    }
}

/// Policy for the `--yes` flag
pub fn policy(yes: bool) -> Box<dyn Confirm> {
    if yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(PromptConfirm)
    }
}
