//! Automation boundary to the external document application.
//!
//! The host application (Word, PowerPoint) owns every document object; this
//! crate only holds [`DocHandle`]s and asks an [`AutomationSession`] to act
//! on them. External error codes are turned into [`AutomationError`] at the
//! boundary and classified with [`ErrorCodes::classify`].

pub mod bridge;
pub mod presentation;
pub mod word;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::errors::{AutomationError, DriverError};
use crate::models::{HostApp, Role, RoleMap};
use crate::prompt::ResolutionPrompt;

pub use bridge::{BridgeFactory, BridgeSession};

// ---------------------------------------------------------------------------
// Handles and request types
// ---------------------------------------------------------------------------

/// Opaque reference to a document open in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocHandle(pub u64);

/// Where the host puts the result of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareDestination {
    Original,
    Revised,
    New,
}

/// What to do with unsaved changes when closing a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveChanges {
    DoNotSave,
    Save,
    Prompt,
}

/// Granularity switches for compare and merge. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareOptions {
    pub formatting: bool,
    pub case_changes: bool,
    pub whitespace: bool,
    pub tables: bool,
    pub headers: bool,
    pub footnotes: bool,
    pub textboxes: bool,
    pub fields: bool,
    pub comments: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            formatting: true,
            case_changes: true,
            whitespace: true,
            tables: true,
            headers: true,
            footnotes: true,
            textboxes: true,
            fields: true,
            comments: true,
        }
    }
}

/// Arguments of a compare or merge call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareRequest {
    pub original: DocHandle,
    pub revised: DocHandle,
    pub destination: CompareDestination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_author: Option<String>,
    pub revised_author: String,
    pub options: CompareOptions,
    /// Ask the user which side's formatting wins (merge only).
    pub formatting_from_prompt: bool,
}

impl CompareRequest {
    pub fn new(
        original: DocHandle,
        revised: DocHandle,
        destination: CompareDestination,
        revised_author: impl Into<String>,
    ) -> Self {
        Self {
            original,
            revised,
            destination,
            original_author: None,
            revised_author: revised_author.into(),
            options: CompareOptions::default(),
            formatting_from_prompt: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Session traits
// ---------------------------------------------------------------------------

/// One running instance of the host application.
///
/// Every method is a blocking call; the driver makes no progress until the
/// host answers.
pub trait AutomationSession {
    fn open(&mut self, path: &Path) -> Result<DocHandle, AutomationError>;

    /// Compare two documents; returns the document holding the differences.
    fn compare(&mut self, request: &CompareRequest) -> Result<DocHandle, AutomationError>;

    /// Merge two documents; returns the merge result document.
    fn merge(&mut self, request: &CompareRequest) -> Result<DocHandle, AutomationError>;

    /// Merge the file at `path` into the open document `target`.
    fn merge_into(&mut self, target: DocHandle, path: &Path) -> Result<(), AutomationError>;

    fn save_as(&mut self, doc: DocHandle, path: &Path) -> Result<(), AutomationError>;

    fn close(&mut self, doc: DocHandle, save: SaveChanges) -> Result<(), AutomationError>;

    /// Flag `doc` as saved so closing it does not prompt.
    fn mark_saved(&mut self, doc: DocHandle) -> Result<(), AutomationError>;

    /// Look up an open document by its full path.
    fn find_open(&mut self, path: &Path) -> Result<DocHandle, AutomationError>;

    fn track_revisions(&mut self, doc: DocHandle) -> Result<bool, AutomationError>;

    fn revision_count(&mut self, doc: DocHandle) -> Result<u32, AutomationError>;

    fn document_count(&mut self) -> Result<u32, AutomationError>;

    fn set_visible(&mut self, visible: bool) -> Result<(), AutomationError>;

    /// Make the application visible, activate it and maximize its window.
    fn bring_to_front(&mut self) -> Result<(), AutomationError>;

    fn quit(&mut self) -> Result<(), AutomationError>;
}

/// Starts host sessions. A launch failure means the application is missing.
pub trait SessionFactory {
    fn launch(&self, app: HostApp) -> Result<Box<dyn AutomationSession>, AutomationError>;
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// What an automation failure most likely means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The document was closed by the user.
    DocumentClosed,
    /// The whole application went away.
    SessionClosed,
    Other,
}

/// External error codes used to recognize closed documents and sessions.
///
/// Best-effort only: the values come from one host version and may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCodes {
    pub document_closed: Vec<i32>,
    pub session_closed: Vec<i32>,
}

impl Default for ErrorCodes {
    fn default() -> Self {
        Self {
            // DISP_E_EXCEPTION
            document_closed: vec![-2147352567],
            // RPC_S_SERVER_UNAVAILABLE, RPC_S_UNKNOWN_IF
            session_closed: vec![-2147023174, -2147023179],
        }
    }
}

impl ErrorCodes {
    pub fn classify(&self, err: &AutomationError) -> ErrorClass {
        if matches!(err, AutomationError::SessionLost { .. }) {
            return ErrorClass::SessionClosed;
        }
        match err.code() {
            Some(code) if self.document_closed.contains(&code) => ErrorClass::DocumentClosed,
            Some(code) if self.session_closed.contains(&code) => ErrorClass::SessionClosed,
            _ => ErrorClass::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// Backend context
// ---------------------------------------------------------------------------

/// Collaborators a backend needs besides the role map.
pub struct BackendContext<'a> {
    pub sessions: &'a dyn SessionFactory,
    pub prompt: &'a dyn ResolutionPrompt,
    pub error_codes: &'a ErrorCodes,
}

/// Launch `app`, turning a failure into `BackendUnavailable`.
pub(crate) fn launch(
    sessions: &dyn SessionFactory,
    app: HostApp,
) -> Result<Box<dyn AutomationSession>, DriverError> {
    debug!(%app, "initializing automation session");
    sessions.launch(app).map_err(|e| {
        error!(%app, "you must have {app} installed to perform this operation");
        debug!(error = %e, "launch error");
        DriverError::BackendUnavailable {
            app,
            detail: e.to_string(),
        }
    })
}

/// Close every document still attached to a role and quit the session if
/// nothing else is open. Used on error paths; failures are only logged.
pub(crate) fn abandon_session(
    session: &mut dyn AutomationSession,
    roles: &mut RoleMap,
    extra: &[DocHandle],
) {
    let mut handles: Vec<DocHandle> = extra.to_vec();
    for (_, file) in roles.iter_mut() {
        if let Some(handle) = file.backend_handle.take() {
            handles.push(handle);
        }
    }
    for handle in handles {
        if let Err(e) = session.close(handle, SaveChanges::DoNotSave) {
            debug!(?handle, error = %e, "could not close document");
        }
    }
    match session.document_count() {
        Ok(0) => {
            if let Err(e) = session.quit() {
                debug!(error = %e, "could not quit session");
            }
        }
        Ok(n) => debug!(open = n, "leaving session running"),
        Err(e) => debug!(error = %e, "could not query session"),
    }
}

/// Record that `role`'s document is open as `handle`.
pub(crate) fn attach(
    roles: &mut RoleMap,
    role: Role,
    handle: DocHandle,
) -> Result<(), DriverError> {
    let file = roles
        .get_mut(role)
        .ok_or(DriverError::MissingRole(role))?;
    file.backend_handle = Some(handle);
    Ok(())
}

/// Close `role`'s document without saving and forget its handle.
pub(crate) fn close_unsaved(
    session: &mut dyn AutomationSession,
    roles: &mut RoleMap,
    role: Role,
) -> Result<(), DriverError> {
    let file = roles
        .get_mut(role)
        .ok_or(DriverError::MissingRole(role))?;
    if let Some(handle) = file.backend_handle {
        debug!(%role, "closing document");
        session.close(handle, SaveChanges::DoNotSave)?;
        file.backend_handle = None;
    }
    Ok(())
}

/// The open document for `role`.
pub(crate) fn handle(
    roles: &RoleMap,
    role: Role,
) -> Result<DocHandle, DriverError> {
    roles
        .get(role)
        .and_then(|f| f.backend_handle)
        .ok_or(DriverError::MissingRole(role))
}

/// Log a failed backend run the way every backend reports it.
pub(crate) fn report_failure(app: HostApp, err: &DriverError) {
    match err {
        DriverError::BackendOperationFailed(e) => {
            error!(%app, "automation error: {e}");
            debug!(?e, "automation error detail");
        }
        other => error!(%app, "{other}"),
    }
}

/// Absolute path of a role's file as the host sees it.
pub(crate) fn effective_path(
    roles: &RoleMap,
    role: Role,
) -> Result<PathBuf, DriverError> {
    roles
        .get(role)
        .map(|f| f.effective_path.clone())
        .ok_or(DriverError::MissingRole(role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_codes() {
        let codes = ErrorCodes::default();
        let call = |code| AutomationError::Call {
            op: "find_open",
            code: Some(code),
            message: String::new(),
        };
        assert_eq!(codes.classify(&call(-2147352567)), ErrorClass::DocumentClosed);
        assert_eq!(codes.classify(&call(-2147023174)), ErrorClass::SessionClosed);
        assert_eq!(codes.classify(&call(-2147023179)), ErrorClass::SessionClosed);
        assert_eq!(codes.classify(&call(1)), ErrorClass::Other);
    }

    #[test]
    fn test_lost_bridge_counts_as_closed_session() {
        let err = AutomationError::SessionLost {
            op: "find_open",
            detail: "broken pipe".into(),
        };
        assert_eq!(ErrorCodes::default().classify(&err), ErrorClass::SessionClosed);
    }

    #[test]
    fn test_codes_are_configurable() {
        let codes = ErrorCodes {
            document_closed: vec![7],
            session_closed: vec![],
        };
        let err = AutomationError::Call {
            op: "find_open",
            code: Some(-2147023174),
            message: String::new(),
        };
        assert_eq!(codes.classify(&err), ErrorClass::Other);
    }
}
