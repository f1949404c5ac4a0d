//! Operator interaction
//!
//! All "ask the operator" steps go through the [`Prompter`] capability so
//! the interactive sell workflow and the confirmation policy can be driven
//! by scripted answers in tests.

use crate::{Error, Result};
use async_trait::async_trait;
use tracing::info;

/// Capability to ask the operator one line-based question.
///
/// Implementations return the raw (trimmed) answer; blank means "take the
/// default", and resolving that is the caller's job.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(&self, question: &str, default: Option<&str>) -> Result<String>;
}

/// Blocking stdin prompter used by the real agent.
///
/// A pending read blocks the whole agent; there is deliberately no timeout
/// (see DESIGN.md).
pub struct StdinPrompter;

#[async_trait]
impl Prompter for StdinPrompter {
    async fn prompt(&self, question: &str, default: Option<&str>) -> Result<String> {
        let line = match default {
            Some(default) if !default.is_empty() => format!("{} [{}]: ", question, default),
            _ => format!("{}: ", question),
        };
        tokio::task::spawn_blocking(move || {
            use std::io::Write;
            let mut stdout = std::io::stdout();
            stdout.write_all(line.as_bytes())?;
            stdout.flush()?;
            let mut answer = String::new();
            std::io::stdin().read_line(&mut answer)?;
            Ok::<_, std::io::Error>(answer.trim().to_string())
        })
        .await
        .map_err(|e| Error::Prompt(format!("prompt task failed: {}", e)))?
        .map_err(Error::Io)
    }
}

/// Tri-state auto-confirm resolution shared by all sell-executing handlers.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmPolicy {
    /// Explicit per-run override (`--auto-confirm` / `--ask-before-sell`)
    override_flag: Option<bool>,
    /// Configured default
    default_auto: bool,
}

impl ConfirmPolicy {
    pub fn new(override_flag: Option<bool>, default_auto: bool) -> Self {
        Self {
            override_flag,
            default_auto,
        }
    }

    /// Whether confirmable actions proceed without prompting.
    pub fn auto_confirm(&self) -> bool {
        self.override_flag.unwrap_or(self.default_auto)
    }

    /// Resolve one confirmable action. Only `y`/`yes` (any case) counts as
    /// an affirmative answer; blank declines.
    pub async fn confirm(&self, prompter: &dyn Prompter, message: &str) -> Result<bool> {
        if self.auto_confirm() {
            info!(message, "Auto-confirm enabled, proceeding without prompt");
            return Ok(true);
        }
        let answer = prompter.prompt(&format!("{} [y/N]", message), None).await?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }
}
