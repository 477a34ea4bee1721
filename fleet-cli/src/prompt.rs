//! Operator confirmation prompts

use async_trait::async_trait;
use colored::*;
use std::io::{self, BufRead, Write};

use crate::error::{ExecError, Result};

/// Yes/no questions put to the operator
#[async_trait]
pub trait Prompt: Send + Sync {
    /// Show information the operator should see before answering
    fn notify(&self, text: &str);

    /// Ask a yes/no question, `true` when accepted
    async fn confirm(&self, question: &str) -> Result<bool>;
}

/// Prompts on stderr, answers read from stdin
pub struct StdPrompt;

#[async_trait]
impl Prompt for StdPrompt {
    fn notify(&self, text: &str) {
        eprintln!("{}", text);
    }

    async fn confirm(&self, question: &str) -> Result<bool> {
        {
            let mut stderr = io::stderr().lock();
            write!(stderr, "{} {} ", question.bold(), "[y/N]".dimmed()).map_err(ExecError::Prompt)?;
            stderr.flush().map_err(ExecError::Prompt)?;
        }

        // Blocking read off the runtime threads; the caller may drop this
        // future on interrupt.
        let answer = tokio::task::spawn_blocking(|| {
            let mut answer = String::new();
            io::stdin().lock().read_line(&mut answer).map(|_| answer)
        })
        .await
        .map_err(|e| ExecError::Prompt(io::Error::other(e)))?
        .map_err(ExecError::Prompt)?;

        Ok(is_yes(&answer))
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
