//! Registers the diff and merge drivers in Git configuration.
//!
//! Repositories then opt in per path through `.gitattributes`:
//!
//! ```text
//! *.docx diff=dmfo merge=dmfo
//! ```

use std::fmt;
use std::process::Command;
use std::str::FromStr;

use tracing::{debug, error, info};

use crate::errors::InstallError;

/// Which Git configuration file receives the entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    System,
    #[default]
    Global,
    Local,
    Worktree,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Global => "global",
            Self::Local => "local",
            Self::Worktree => "worktree",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    /// Case-insensitive, like the log level names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "global" => Ok(Self::Global),
            "local" => Ok(Self::Local),
            "worktree" => Ok(Self::Worktree),
            other => Err(format!(
                "unknown scope '{other}' (expected system, global, local or worktree)"
            )),
        }
    }
}

/// Key/value pairs written by [`install`], in order.
pub fn driver_entries(executable: &str) -> Vec<(&'static str, String)> {
    vec![
        ("diff.dmfo.name", "DMFO diff driver".into()),
        ("diff.dmfo.command", format!("{executable} diff")),
        ("diff.dmfo.binary", "true".into()),
        ("merge.dmfo.name", "DMFO merge driver".into()),
        (
            "merge.dmfo.driver",
            format!("{executable} merge %O %A %B %L %P"),
        ),
        ("merge.dmfo.binary", "true".into()),
    ]
}

/// Write every driver entry with `git config --<scope>`.
///
/// `git` is the program plus leading arguments. Stops at the first failing
/// command.
pub fn install(git: &[String], scope: Scope, executable: &str) -> Result<(), InstallError> {
    let (program, leading) = git
        .split_first()
        .ok_or_else(|| InstallError::GitNotFound("no git command configured".into()))?;
    info!(%scope, "registering dmfo in git config");

    for (key, value) in driver_entries(executable) {
        debug!(key, value = %value, "git config --{scope}");
        let output = Command::new(program)
            .args(leading)
            .arg("config")
            .arg(format!("--{scope}"))
            .arg(key)
            .arg(&value)
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    InstallError::GitNotFound(format!("'{program}' not found in PATH"))
                }
                _ => InstallError::IoError(e),
            })?;

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(1);
            error!(key, exit_code, "git config failed");
            return Err(InstallError::ConfigFailed {
                key: key.to_string(),
                exit_code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
    }

    info!("driver registration complete");
    Ok(())
}
