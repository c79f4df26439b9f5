//! Merge-resolution confirmation.

use std::path::Path;

/// Asks the user whether a merge result is fully resolved.
///
/// Implementations block until the user answers. Anything other than an
/// explicit "yes" must be reported as `false`.
pub trait ResolutionPrompt {
    fn confirm_resolved(&self, merged: &Path) -> bool;
}

/// Gives the same answer every time. Used for non-interactive runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedAnswer(pub bool);

impl ResolutionPrompt for FixedAnswer {
    fn confirm_resolved(&self, _merged: &Path) -> bool {
        self.0
    }
}
