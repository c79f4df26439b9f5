//! dmfo command-line driver.
//!
//! Git runs `dmfo diff` as an external diff driver and `dmfo merge` as a
//! merge driver; `dmfo install` registers both in Git configuration. The
//! process exit code is the driver outcome:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | diff shown / merge resolved |
//! | 1 | merge not resolved |
//! | 2 | unsupported file extension |
//! | 3 | Office application not installed |
//! | 4 | input file not found |
//! | 5 | unknown `git lfs pointer --check` status |
//! | 6 | unexpected failure |

mod logging;
mod prompt;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error};

use dmfo_core::config::{DmfoConfig, LogLevel};
use dmfo_core::installer::{self, Scope};
use dmfo_core::models::Outcome;
use dmfo_core::{DriverRequest, Runner};

use crate::prompt::TerminalPrompt;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Diff and merge driver for Office documents.
#[derive(Parser, Debug)]
#[command(
    name = "dmfo",
    version,
    about = "Diff and merge driver for Office documents"
)]
struct Cli {
    /// Console log level (CRITICAL, ERROR, WARNING, INFO, DEBUG, NOTSET, ...).
    #[arg(short = 'v', long = "verbosity", global = true, value_name = "LEVEL")]
    verbosity: Option<LogLevel>,

    /// Log file level.
    #[arg(short = 'l', long = "log", global = true, value_name = "LEVEL")]
    log: Option<LogLevel>,

    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Diff driver: `path old-file old-hex old-mode new-file new-hex new-mode`.
    Diff {
        /// Path of the document in the repository.
        path: PathBuf,
        /// old-file ($LOCAL).
        local_file: PathBuf,
        /// old-hex.
        local_hex: String,
        /// old-mode.
        local_mode: String,
        /// new-file ($REMOTE).
        remote_file: PathBuf,
        /// new-hex.
        remote_hex: String,
        /// new-mode.
        remote_mode: String,
    },

    /// Merge driver: `%O %A %B [%L] [%P]`.
    Merge {
        /// $BASE (%O).
        base_file: PathBuf,
        /// $LOCAL (%A); receives the merge result.
        local_file: PathBuf,
        /// $REMOTE (%B).
        remote_file: PathBuf,
        /// Conflict marker size (%L).
        conflict_marker_size: Option<String>,
        /// $MERGED (%P); its extension selects the backend.
        merge_dest: Option<PathBuf>,
    },

    /// Register the drivers in Git configuration.
    Install {
        /// system, global, local or worktree.
        #[arg(default_value = "global")]
        scope: Scope,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Diff { .. } => "diff",
            Self::Merge { .. } => "merge",
            Self::Install { .. } => "install",
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            Outcome::BackendOperationFailed.into()
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let config =
        DmfoConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let console_level = cli.verbosity.unwrap_or(config.logging.console_level);
    let file_level = cli.log.unwrap_or(config.logging.file_level);
    let logs = logging::init(cli.command.name(), console_level, file_level)?;
    if let Some(path) = logs.log_file() {
        debug!(path = %path.display(), "logging to file");
    }

    let code = match cli.command {
        Commands::Install { scope } => cmd_install(&config, scope),
        Commands::Diff {
            path,
            local_file,
            local_hex,
            local_mode,
            remote_file,
            remote_hex,
            remote_mode,
        } => {
            debug!(%local_hex, %local_mode, %remote_hex, %remote_mode, "blob metadata");
            cmd_driver(
                config,
                DriverRequest::Diff {
                    path,
                    local: local_file,
                    remote: remote_file,
                },
            )
        }
        Commands::Merge {
            base_file,
            local_file,
            remote_file,
            conflict_marker_size,
            merge_dest,
        } => {
            debug!(?conflict_marker_size, "conflict marker size");
            cmd_driver(
                config,
                DriverRequest::Merge {
                    base: base_file,
                    local: local_file,
                    remote: remote_file,
                    dest: merge_dest,
                },
            )
        }
    };

    if let Some(path) = logs.finish(code) {
        eprintln!(
            "{}",
            style::warn(&format!(
                "dmfo exited with code {code}, log kept at {}",
                style::dim(&path.display().to_string())
            ))
        );
    }
    Ok(code)
}

fn cmd_driver(config: DmfoConfig, request: DriverRequest) -> u8 {
    let runner = Runner::from_config(config, Box::new(TerminalPrompt));
    runner.run(&request).code()
}

// ---------------------------------------------------------------------------
// Install
// ---------------------------------------------------------------------------

fn cmd_install(config: &DmfoConfig, scope: Scope) -> u8 {
    match installer::install(&config.lfs.command, scope, &config.install.executable) {
        Ok(()) => {
            println!(
                "{}",
                style::success(&format!("dmfo registered in {scope} git config"))
            );
            0
        }
        Err(e) => {
            error!("{e}");
            e.exit_code()
        }
    }
}
