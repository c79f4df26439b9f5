//! Error types for the dmfo core library.
//!
//! Each subsystem has its own error type derived with `thiserror`. Every
//! error that can end a driver run knows which [`Outcome`] (process exit
//! code) it turns into, so the binary never has to guess.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::{HostApp, Mode, Outcome};

// ---------------------------------------------------------------------------
// Git LFS errors
// ---------------------------------------------------------------------------

/// Errors from the `git lfs` command-line filters.
#[derive(Debug, Error)]
pub enum LfsError {
    /// The configured git program could not be spawned.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// `git lfs pointer --check` reported that the file does not exist.
    #[error("file not found: '{}'", .0.display())]
    FileNotFound(PathBuf),

    /// `git lfs pointer --check` returned a status outside {0, 1, 2}.
    #[error("unknown 'git lfs pointer --check' status {code} for '{}'", .path.display())]
    UnknownStatus { path: PathBuf, code: i32 },

    /// A smudge or clean filter exited with a non-zero status.
    #[error("git lfs {filter} failed (exit {exit_code}): {stderr}")]
    FilterFailed {
        filter: &'static str,
        exit_code: i32,
        stderr: String,
    },

    /// Generic I/O wrapper.
    #[error("git lfs I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LfsError {
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::FileNotFound(_) => Outcome::FileNotFound,
            Self::UnknownStatus { .. } => Outcome::UnknownLfsStatus,
            Self::BinaryNotFound(_) | Self::FilterFailed { .. } | Self::IoError(_) => {
                Outcome::BackendOperationFailed
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Staging errors
// ---------------------------------------------------------------------------

/// Errors raised while preparing or restoring role files.
#[derive(Debug, Error)]
pub enum StageError {
    /// A path supplied by Git does not exist.
    #[error("input file not found: '{}'", .0.display())]
    FileNotFound(PathBuf),

    /// The LFS resolver failed for a role.
    #[error("{role}: {source}")]
    Lfs {
        role: crate::models::Role,
        #[source]
        source: LfsError,
    },

    /// The auxiliary path for a role is already taken by another file.
    #[error("{role}: refusing to overwrite existing file '{}'", .path.display())]
    AuxPathTaken {
        role: crate::models::Role,
        path: PathBuf,
    },

    /// A filesystem operation on a staged file failed.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::FileNotFound(_) => Outcome::FileNotFound,
            Self::Lfs { source, .. } => source.outcome(),
            Self::AuxPathTaken { .. } | Self::Io { .. } => Outcome::BackendOperationFailed,
        }
    }
}

// ---------------------------------------------------------------------------
// Automation errors
// ---------------------------------------------------------------------------

/// Errors reported by the external document application's automation surface.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// The host application could not be started at all.
    #[error("could not launch {app}: {detail}")]
    LaunchFailed { app: HostApp, detail: String },

    /// An automation call returned an error.
    #[error("{op} failed{}: {message}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    Call {
        op: &'static str,
        code: Option<i32>,
        message: String,
    },

    /// The session went away underneath us (bridge exited, pipe closed).
    #[error("automation session lost during {op}: {detail}")]
    SessionLost { op: &'static str, detail: String },

    /// The bridge answered with something we could not understand.
    #[error("malformed automation response to {op}: {detail}")]
    Protocol { op: &'static str, detail: String },
}

impl AutomationError {
    /// The raw external error code, when the application supplied one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Call { code, .. } => *code,
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Driver errors
// ---------------------------------------------------------------------------

/// Errors from driver dispatch and the backend phase.
#[derive(Debug, Error)]
pub enum DriverError {
    /// No backend handles this extension in this mode.
    #[error("dmfo {mode} does not know what to do with '{extension}' files")]
    UnsupportedExtension { mode: Mode, extension: String },

    /// The host application is not installed or would not start.
    #[error("you must have {app} installed to perform this operation: {detail}")]
    BackendUnavailable { app: HostApp, detail: String },

    /// An automation call failed while the backend was running.
    #[error("backend operation failed: {0}")]
    BackendOperationFailed(#[from] AutomationError),

    /// A role the backend needs was never staged.
    #[error("role {0} is missing from the role map")]
    MissingRole(crate::models::Role),
}

impl DriverError {
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::UnsupportedExtension { .. } => Outcome::UnsupportedExtension,
            Self::BackendUnavailable { .. } => Outcome::BackendUnavailable,
            Self::BackendOperationFailed(_) | Self::MissingRole(_) => {
                Outcome::BackendOperationFailed
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Installer errors
// ---------------------------------------------------------------------------

/// Errors from registering the driver in Git configuration.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The git binary could not be spawned.
    #[error("git binary not found: {0}")]
    GitNotFound(String),

    /// A `git config` invocation failed.
    #[error("git config {key} failed (exit {exit_code}): {stderr}")]
    ConfigFailed {
        key: String,
        exit_code: i32,
        stderr: String,
    },

    /// Generic I/O wrapper.
    #[error("installer I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl InstallError {
    /// Git's own exit status is passed through; everything else is 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigFailed { exit_code, .. } => u8::try_from(*exit_code)
                .ok()
                .filter(|c| *c != 0)
                .unwrap_or(1),
            _ => 1,
        }
    }
}
