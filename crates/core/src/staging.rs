//! File lifecycle manager.
//!
//! [`stage_all`] turns the paths Git hands us into files the host
//! application can open: absolute, real content (not LFS pointers), carrying
//! the target extension and writable. [`teardown_all`] puts the merge result
//! where Git expects it and removes every auxiliary file staging created.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::StageError;
use crate::extension;
use crate::lfs::{self, LfsFilter};
use crate::models::{Mode, Role, RoleMap, StagedFile, TargetExtension};
use crate::permissions;

/// What happens to auxiliary files already created when staging aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbortPolicy {
    /// Delete them before reporting the error.
    #[default]
    Rollback,
    /// Leave them on disk.
    Leave,
}

/// Per-invocation staging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingContext {
    pub target: TargetExtension,
    pub policy: AbortPolicy,
}

impl StagingContext {
    pub fn new(target: TargetExtension, policy: AbortPolicy) -> Self {
        Self { target, policy }
    }
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

/// Stage every role in order (LOCAL, REMOTE, BASE), stopping at the first
/// failure.
pub fn stage_all(
    roles: &mut RoleMap,
    filter: &dyn LfsFilter,
    ctx: &StagingContext,
) -> Result<(), StageError> {
    let mut created = Vec::new();

    for (role, file) in roles.iter_mut() {
        if file.staged {
            continue;
        }
        if let Err(e) = stage_one(role, file, filter, &ctx.target, &mut created) {
            abort(&created, ctx.policy);
            return Err(e);
        }
    }
    Ok(())
}

fn stage_one(
    role: Role,
    file: &mut StagedFile,
    filter: &dyn LfsFilter,
    target: &TargetExtension,
    created: &mut Vec<PathBuf>,
) -> Result<(), StageError> {
    let absolute = match fs::canonicalize(&file.original_path) {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StageError::FileNotFound(file.original_path.clone()));
        }
        Err(e) => return Err(StageError::io(&file.original_path, e)),
    };
    debug!(%role, path = %absolute.display(), "processing");
    file.original_path = absolute;

    // Teardown deletes the aux file, so it must not be someone else's.
    let aux = extension::effective_path(&file.original_path, target);
    if aux != file.original_path && fs::symlink_metadata(&aux).is_ok() {
        return Err(StageError::AuxPathTaken { role, path: aux });
    }

    let resolution = lfs::resolve(filter, &file.original_path, target)
        .map_err(|source| StageError::Lfs { role, source })?;
    if resolution.effective_path != file.original_path {
        created.push(resolution.effective_path.clone());
    }

    permissions::make_writable(&resolution.effective_path)
        .map_err(|e| StageError::io(&resolution.effective_path, e))?;

    file.is_lfs = resolution.is_lfs;
    file.effective_path = resolution.effective_path;
    file.staged = true;
    Ok(())
}

fn abort(created: &[PathBuf], policy: AbortPolicy) {
    match policy {
        AbortPolicy::Rollback => {
            for path in created {
                remove_aux_file(path);
            }
        }
        AbortPolicy::Leave => {
            for path in created {
                warn!(path = %path.display(), "leaving auxiliary file behind");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

/// Restore the working tree after the backend phase.
///
/// In merge mode the result (the MERGE role, registered once the host saved
/// it, or LOCAL's staged file when nothing was saved) replaces the original
/// LOCAL file: re-pointerized through the LFS clean filter when LOCAL or
/// REMOTE was LFS-managed, copied otherwise.
/// Auxiliary files are then deleted for every staged role, even when the
/// copy-back failed; its error is returned afterwards.
pub fn teardown_all(
    roles: &mut RoleMap,
    mode: Mode,
    filter: &dyn LfsFilter,
) -> Result<(), StageError> {
    let copy_back = match mode {
        Mode::Merge => write_back_merge(roles, filter),
        Mode::Diff => Ok(()),
    };

    let mut removed = BTreeSet::new();
    for (role, file) in roles.iter_mut() {
        if !file.staged {
            continue;
        }
        if file.has_aux_file() && removed.insert(file.effective_path.clone()) {
            debug!(%role, path = %file.effective_path.display(), "removing aux file");
            remove_aux_file(&file.effective_path);
        }
        file.staged = false;
    }

    copy_back
}

fn write_back_merge(roles: &RoleMap, filter: &dyn LfsFilter) -> Result<(), StageError> {
    // Without a saved result LOCAL's own staged copy goes back, so a
    // pointer smudged in place is restored even when the backend failed.
    let (role, result) = match roles.get(Role::Merge) {
        Some(merge) => (Role::Merge, merge),
        None => match roles.get(Role::Local).filter(|f| f.staged) {
            Some(local) => {
                debug!("no merge result was saved, restoring LOCAL");
                (Role::Local, local)
            }
            None => return Ok(()),
        },
    };
    let dest = &result.original_path;
    let lfs_managed = [Role::Local, Role::Remote, Role::Merge]
        .into_iter()
        .any(|r| roles.get(r).is_some_and(|f| f.is_lfs));

    if lfs_managed {
        lfs::clean_to(filter, &result.effective_path, dest)
            .map_err(|source| StageError::Lfs { role, source })?;
    } else if result.has_aux_file() {
        info!(dest = %dest.display(), "copying merged file");
        fs::copy(&result.effective_path, dest).map_err(|e| StageError::io(dest, e))?;
    } else {
        debug!(path = %dest.display(), "merge result already in place");
    }
    Ok(())
}

/// Best-effort removal; a file that is already gone is not an error.
fn remove_aux_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "aux file already gone");
        }
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove aux file"),
    }
}
