//! Terminal confirmation for merge results.

use std::path::Path;

use dialoguer::Confirm;
use tracing::warn;

use dmfo_core::prompt::ResolutionPrompt;

/// Asks on the controlling terminal. No answer counts as "not resolved".
pub struct TerminalPrompt;

impl ResolutionPrompt for TerminalPrompt {
    fn confirm_resolved(&self, merged: &Path) -> bool {
        let answer = Confirm::new()
            .with_prompt(format!(
                "Confirm conflict resolution for {}?",
                merged.display()
            ))
            .default(false)
            .interact();

        match answer {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(error = %e, "could not read confirmation, treating merge as unresolved");
                false
            }
        }
    }
}
