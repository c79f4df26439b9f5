//! Presentation backend. Diff only.

use tracing::debug;

use super::{
    abandon_session, attach, effective_path, handle, launch, report_failure, AutomationSession,
    BackendContext,
};
use crate::errors::DriverError;
use crate::models::{HostApp, Outcome, Role, RoleMap};

const APP: HostApp = HostApp::PowerPoint;

/// Open LOCAL and merge REMOTE into it; the host shows the differences as
/// revisions. The merged deck is never saved.
pub fn diff(ctx: &BackendContext<'_>, roles: &mut RoleMap) -> Result<Outcome, DriverError> {
    let mut session = launch(ctx.sessions, APP)?;

    match show_differences(session.as_mut(), roles) {
        Ok(()) => Ok(Outcome::Success),
        Err(e) => {
            report_failure(APP, &e);
            abandon_session(session.as_mut(), roles, &[]);
            Err(e)
        }
    }
}

fn show_differences(
    session: &mut dyn AutomationSession,
    roles: &mut RoleMap,
) -> Result<(), DriverError> {
    let local_path = effective_path(roles, Role::Local)?;
    debug!(path = %local_path.display(), "opening LOCAL");
    let local = session.open(&local_path)?;
    attach(roles, Role::Local, local)?;

    let remote_path = effective_path(roles, Role::Remote)?;
    debug!(path = %remote_path.display(), "merging REMOTE into LOCAL");
    session.merge_into(handle(roles, Role::Local)?, &remote_path)?;

    session.mark_saved(local)?;

    debug!("bringing to foreground");
    session.bring_to_front()?;
    Ok(())
}
