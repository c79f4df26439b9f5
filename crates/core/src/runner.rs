//! One driver invocation: stage, dispatch, tear down.

use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::backend::{BackendContext, BridgeFactory, SessionFactory};
use crate::config::DmfoConfig;
use crate::dispatch;
use crate::errors::DriverError;
use crate::lfs::{GitLfsCli, LfsFilter};
use crate::models::{Mode, Outcome, RoleMap, TargetExtension};
use crate::prompt::ResolutionPrompt;
use crate::staging::{self, StagingContext};

/// File arguments Git passes to a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverRequest {
    /// `GIT_EXTERNAL_DIFF` contract; hex and mode arguments are not needed.
    Diff {
        path: PathBuf,
        local: PathBuf,
        remote: PathBuf,
    },
    /// Merge driver contract (`%O %A %B %L %P`).
    Merge {
        base: PathBuf,
        local: PathBuf,
        remote: PathBuf,
        dest: Option<PathBuf>,
    },
}

impl DriverRequest {
    pub fn mode(&self) -> Mode {
        match self {
            Self::Diff { .. } => Mode::Diff,
            Self::Merge { .. } => Mode::Merge,
        }
    }

    /// Extension of the document Git is asking about.
    ///
    /// Empty for a merge without a destination path; dispatch then rejects
    /// it as unsupported.
    pub fn target_extension(&self) -> TargetExtension {
        match self {
            Self::Diff { path, .. } => TargetExtension::from_path(path),
            Self::Merge { dest, .. } => dest
                .as_deref()
                .map(TargetExtension::from_path)
                .unwrap_or_else(|| TargetExtension::new("")),
        }
    }

    pub fn role_map(&self) -> RoleMap {
        match self {
            Self::Diff { local, remote, .. } => RoleMap::for_diff(local, remote),
            Self::Merge {
                base,
                local,
                remote,
                ..
            } => RoleMap::for_merge(base, local, remote),
        }
    }
}

/// Runs driver requests against a set of collaborators.
pub struct Runner {
    config: DmfoConfig,
    lfs: Box<dyn LfsFilter>,
    sessions: Box<dyn SessionFactory>,
    prompt: Box<dyn ResolutionPrompt>,
}

impl Runner {
    pub fn new(
        config: DmfoConfig,
        lfs: Box<dyn LfsFilter>,
        sessions: Box<dyn SessionFactory>,
        prompt: Box<dyn ResolutionPrompt>,
    ) -> Self {
        Self {
            config,
            lfs,
            sessions,
            prompt,
        }
    }

    /// Real collaborators: the `git lfs` CLI and the automation bridge.
    pub fn from_config(config: DmfoConfig, prompt: Box<dyn ResolutionPrompt>) -> Self {
        let lfs = GitLfsCli::new(config.lfs.command.clone());
        let sessions = BridgeFactory::new(config.automation.bridge.clone());
        Self::new(config, Box::new(lfs), Box::new(sessions), prompt)
    }

    /// Execute one request and return the exit outcome.
    ///
    /// Teardown runs whenever staging succeeded, whatever the backend did.
    pub fn run(&self, request: &DriverRequest) -> Outcome {
        let mode = request.mode();
        let target = request.target_extension();
        let mut roles = request.role_map();
        info!(%mode, extension = %target, "starting driver");

        let staging_ctx = StagingContext::new(target.clone(), self.config.staging.on_abort);
        if let Err(e) = staging::stage_all(&mut roles, self.lfs.as_ref(), &staging_ctx) {
            error!("{e}");
            return e.outcome();
        }

        let error_codes = self.config.automation.error_codes();
        let ctx = BackendContext {
            sessions: self.sessions.as_ref(),
            prompt: self.prompt.as_ref(),
            error_codes: &error_codes,
        };
        let outcome = match dispatch::run(mode, &target, &mut roles, &ctx, &self.config.drivers) {
            Ok(outcome) => outcome,
            Err(e) => {
                // Backends and dispatch log their own failures.
                if let DriverError::MissingRole(_) = e {
                    error!("{e}");
                }
                e.outcome()
            }
        };

        if let Err(e) = staging::teardown_all(&mut roles, mode, self.lfs.as_ref()) {
            error!("teardown failed: {e}");
            if outcome.is_clean_exit() {
                return e.outcome();
            }
        }

        debug!(code = outcome.code(), "driver finished");
        outcome
    }
}
