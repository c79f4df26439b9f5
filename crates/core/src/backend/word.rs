//! Word-processor backend.
//!
//! Diff shows the REMOTE changes as tracked revisions against LOCAL in a new,
//! unsaved document. Merge compares LOCAL and REMOTE against BASE, merges
//! both into a new document saved over LOCAL, and lets the user resolve the
//! remaining revisions before confirming.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{
    abandon_session, attach, close_unsaved, effective_path, handle, launch, report_failure,
    AutomationSession, BackendContext, CompareDestination, CompareRequest, DocHandle,
    ErrorClass, SaveChanges,
};
use crate::errors::DriverError;
use crate::models::{HostApp, Outcome, Role, RoleMap};

const APP: HostApp = HostApp::Word;

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Open LOCAL and REMOTE and show their differences.
///
/// The application is left running and visible so the user can read the
/// result; the driver does not wait for it to be closed.
pub fn diff(ctx: &BackendContext<'_>, roles: &mut RoleMap) -> Result<Outcome, DriverError> {
    let mut session = launch(ctx.sessions, APP)?;
    let mut extra = Vec::new();

    match show_differences(session.as_mut(), roles, &mut extra) {
        Ok(()) => Ok(Outcome::Success),
        Err(e) => {
            report_failure(APP, &e);
            abandon_session(session.as_mut(), roles, &extra);
            Err(e)
        }
    }
}

fn show_differences(
    session: &mut dyn AutomationSession,
    roles: &mut RoleMap,
    extra: &mut Vec<DocHandle>,
) -> Result<(), DriverError> {
    for role in [Role::Local, Role::Remote] {
        open_role(session, roles, role)?;
    }

    debug!("diffing REMOTE against LOCAL");
    let request = CompareRequest::new(
        handle(roles, Role::Local)?,
        handle(roles, Role::Remote)?,
        CompareDestination::New,
        Role::Remote.as_str(),
    );
    let diff = session.compare(&request)?;
    extra.push(diff);

    for role in [Role::Local, Role::Remote] {
        close_unsaved(session, roles, role)?;
    }

    debug!("marking DIFF as saved");
    session.mark_saved(diff)?;

    debug!("bringing to foreground");
    session.bring_to_front()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Three-way merge of BASE, LOCAL and REMOTE into LOCAL.
///
/// Returns [`Outcome::Success`] only when the user confirmed the resolution
/// and the saved result carries no unresolved revisions.
pub fn merge(ctx: &BackendContext<'_>, roles: &mut RoleMap) -> Result<Outcome, DriverError> {
    let mut session = launch(ctx.sessions, APP)?;
    let mut extra = Vec::new();

    let merged_path = match produce_merge(session.as_mut(), roles, &mut extra) {
        Ok(path) => path,
        Err(e) => {
            report_failure(APP, &e);
            abandon_session(session.as_mut(), roles, &extra);
            return Err(e);
        }
    };

    debug!("asking for merge confirmation");
    let resolved = ctx.prompt.confirm_resolved(&merged_path);
    debug!(resolved, "merge confirmation reply");

    let (mut session, reopen) = locate_merge_result(ctx, session, roles, &merged_path)?;
    match review_merge(session.as_mut(), roles, &merged_path, reopen, resolved) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            report_failure(APP, &e);
            abandon_session(session.as_mut(), roles, &[]);
            Err(e)
        }
    }
}

/// Build the merge document and save it over LOCAL. Returns the saved path.
fn produce_merge(
    session: &mut dyn AutomationSession,
    roles: &mut RoleMap,
    extra: &mut Vec<DocHandle>,
) -> Result<PathBuf, DriverError> {
    for role in [Role::Base, Role::Local, Role::Remote] {
        open_role(session, roles, role)?;
    }

    let base = handle(roles, Role::Base)?;
    for role in [Role::Local, Role::Remote] {
        debug!(%role, "diffing against BASE");
        let request = CompareRequest::new(
            base,
            handle(roles, role)?,
            CompareDestination::Revised,
            role.as_str(),
        );
        let revised = session.compare(&request)?;
        attach(roles, role, revised)?;
    }

    debug!("merging changes");
    let mut request = CompareRequest::new(
        handle(roles, Role::Local)?,
        handle(roles, Role::Remote)?,
        CompareDestination::New,
        "Merge REMOTE",
    );
    request.original_author = Some("Merge LOCAL".into());
    request.formatting_from_prompt = true;
    let merged = session.merge(&request)?;
    extra.push(merged);

    for role in [Role::Base, Role::Local, Role::Remote] {
        close_unsaved(session, roles, role)?;
    }

    let target = effective_path(roles, Role::Local)?;
    info!(path = %target.display(), "saving MERGE");
    session.save_as(merged, &target)?;
    roles.register_merge_output();
    attach(roles, Role::Merge, merged)?;
    extra.retain(|h| *h != merged);

    debug!("bringing to foreground");
    session.bring_to_front()?;
    Ok(target)
}

/// Find the merge result again after the user had the application to
/// themselves. Returns the session to continue with and whether the result
/// has to be reopened.
///
/// A closed session is relaunched once; a second launch failure is
/// reported as the application being unavailable.
fn locate_merge_result(
    ctx: &BackendContext<'_>,
    mut session: Box<dyn AutomationSession>,
    roles: &mut RoleMap,
    merged_path: &Path,
) -> Result<(Box<dyn AutomationSession>, bool), DriverError> {
    debug!("checking if MERGE is still open");
    let err = match session.find_open(merged_path) {
        Ok(doc) => {
            debug!("MERGE is still open");
            attach(roles, Role::Merge, doc)?;
            return Ok((session, false));
        }
        Err(e) => e,
    };

    match ctx.error_codes.classify(&err) {
        ErrorClass::DocumentClosed => debug!("MERGE has been closed, reopening"),
        ErrorClass::SessionClosed => {
            debug!("automation session has been closed, reinitializing");
            drop(session);
            session = launch(ctx.sessions, APP)?;
        }
        ErrorClass::Other => warn!("automation error while looking for MERGE: {err}"),
    }
    if let Some(merge) = roles.get_mut(Role::Merge) {
        merge.backend_handle = None;
    }
    Ok((session, true))
}

fn review_merge(
    session: &mut dyn AutomationSession,
    roles: &mut RoleMap,
    merged_path: &Path,
    reopen: bool,
    mut resolved: bool,
) -> Result<Outcome, DriverError> {
    session.set_visible(false)?;

    let merged = if reopen {
        debug!(path = %merged_path.display(), "opening MERGE");
        let doc = session.open(merged_path)?;
        attach(roles, Role::Merge, doc)?;
        doc
    } else {
        handle(roles, Role::Merge)?
    };

    if session.track_revisions(merged)? {
        warn!("Track Changes is active, please deactivate it");
    }
    if resolved {
        let remaining = session.revision_count(merged)?;
        if remaining > 0 {
            resolved = false;
            warn!(
                revisions = remaining,
                "unresolved revisions in the document, exiting as unresolved"
            );
        }
    }

    session.close(merged, SaveChanges::Prompt)?;
    if let Some(merge) = roles.get_mut(Role::Merge) {
        merge.backend_handle = None;
    }

    if session.document_count()? == 0 {
        debug!("no more open documents, quitting");
        session.quit()?;
    }

    Ok(if resolved {
        Outcome::Success
    } else {
        Outcome::Unresolved
    })
}

fn open_role(
    session: &mut dyn AutomationSession,
    roles: &mut RoleMap,
    role: Role,
) -> Result<DocHandle, DriverError> {
    let path = effective_path(roles, role)?;
    debug!(%role, path = %path.display(), "opening document");
    let doc = session.open(&path)?;
    attach(roles, role, doc)?;
    Ok(doc)
}
