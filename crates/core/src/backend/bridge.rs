//! Automation bridge client.
//!
//! The host application is driven through a helper process (for Office on
//! Windows, a script talking to the COM automation interface). The helper
//! reads one JSON request per line on stdin and answers with one JSON
//! object per line on stdout:
//!
//! ```text
//! → {"op":"open","path":"C:\\tmp\\a.docx","read_only":false,...}
//! ← {"ok":true,"doc":3}
//! → {"op":"find_open","path":"C:\\tmp\\m.docx"}
//! ← {"ok":false,"code":-2147352567,"message":"Bad file name"}
//! ```
//!
//! The first request is always `launch`; a bridge that cannot start the
//! application answers it with `ok: false` or exits.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{AutomationSession, CompareRequest, DocHandle, SaveChanges, SessionFactory};
use crate::errors::AutomationError;
use crate::models::HostApp;

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Launch {
        app: &'a str,
        visible: bool,
    },
    Open {
        path: &'a Path,
        confirm_conversions: bool,
        read_only: bool,
        add_to_recent_files: bool,
    },
    Compare(&'a CompareRequest),
    Merge(&'a CompareRequest),
    MergeInto {
        doc: DocHandle,
        path: &'a Path,
    },
    SaveAs {
        doc: DocHandle,
        path: &'a Path,
        add_to_recent_files: bool,
    },
    Close {
        doc: DocHandle,
        save: SaveChanges,
    },
    MarkSaved {
        doc: DocHandle,
    },
    FindOpen {
        path: &'a Path,
    },
    TrackRevisions {
        doc: DocHandle,
    },
    RevisionCount {
        doc: DocHandle,
    },
    DocumentCount,
    SetVisible {
        visible: bool,
    },
    BringToFront,
    Quit,
}

impl Request<'_> {
    fn op(&self) -> &'static str {
        match self {
            Self::Launch { .. } => "launch",
            Self::Open { .. } => "open",
            Self::Compare(_) => "compare",
            Self::Merge(_) => "merge",
            Self::MergeInto { .. } => "merge_into",
            Self::SaveAs { .. } => "save_as",
            Self::Close { .. } => "close",
            Self::MarkSaved { .. } => "mark_saved",
            Self::FindOpen { .. } => "find_open",
            Self::TrackRevisions { .. } => "track_revisions",
            Self::RevisionCount { .. } => "revision_count",
            Self::DocumentCount => "document_count",
            Self::SetVisible { .. } => "set_visible",
            Self::BringToFront => "bring_to_front",
            Self::Quit => "quit",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    ok: bool,
    #[serde(default)]
    doc: Option<DocHandle>,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    code: Option<i32>,
    #[serde(default)]
    message: Option<String>,
}

impl Response {
    fn doc(self, op: &'static str) -> Result<DocHandle, AutomationError> {
        self.doc.ok_or_else(|| AutomationError::Protocol {
            op,
            detail: "response carries no document handle".into(),
        })
    }

    fn bool_value(self, op: &'static str) -> Result<bool, AutomationError> {
        self.value
            .as_ref()
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| AutomationError::Protocol {
                op,
                detail: format!("expected a boolean value, got {:?}", self.value),
            })
    }

    fn u32_value(self, op: &'static str) -> Result<u32, AutomationError> {
        self.value
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| AutomationError::Protocol {
                op,
                detail: format!("expected a count, got {:?}", self.value),
            })
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Launches [`BridgeSession`]s from a configured command line.
#[derive(Debug, Clone)]
pub struct BridgeFactory {
    command: Vec<String>,
}

impl BridgeFactory {
    /// `command` is the bridge program followed by its arguments.
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl SessionFactory for BridgeFactory {
    fn launch(&self, app: HostApp) -> Result<Box<dyn AutomationSession>, AutomationError> {
        Ok(Box::new(BridgeSession::spawn(&self.command, app)?))
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A running bridge process bound to one host application instance.
pub struct BridgeSession {
    app: HostApp,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl BridgeSession {
    /// Start the bridge and ask it to launch `app` hidden.
    pub fn spawn(command: &[String], app: HostApp) -> Result<Self, AutomationError> {
        let launch_failed = |detail: String| AutomationError::LaunchFailed { app, detail };

        let (program, args) = command
            .split_first()
            .ok_or_else(|| launch_failed("no automation bridge configured".into()))?;

        debug!(program, ?args, %app, "starting automation bridge");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                launch_failed(format!(
                    "failed to start bridge '{program}' (see automation.bridge): {e}"
                ))
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(launch_failed("bridge stdio not captured".into()));
        };

        let mut session = Self {
            app,
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
        };
        session
            .call(&Request::Launch {
                app: app.automation_name(),
                visible: false,
            })
            .map_err(|e| launch_failed(e.to_string()))?;
        Ok(session)
    }

    fn call(&mut self, request: &Request<'_>) -> Result<Response, AutomationError> {
        let op = request.op();
        let lost = |detail: String| AutomationError::SessionLost { op, detail };

        let mut line = serde_json::to_string(request).map_err(|e| AutomationError::Protocol {
            op,
            detail: e.to_string(),
        })?;
        line.push('\n');
        trace!(app = %self.app, %line, "bridge request");

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| lost("bridge already shut down".into()))?;
        stdin
            .write_all(line.as_bytes())
            .and_then(|()| stdin.flush())
            .map_err(|e| lost(e.to_string()))?;

        let mut reply = String::new();
        let read = self
            .stdout
            .read_line(&mut reply)
            .map_err(|e| lost(e.to_string()))?;
        if read == 0 {
            return Err(lost("bridge exited".into()));
        }
        trace!(reply = %reply.trim_end(), "bridge response");

        let response: Response =
            serde_json::from_str(&reply).map_err(|e| AutomationError::Protocol {
                op,
                detail: e.to_string(),
            })?;
        if !response.ok {
            return Err(AutomationError::Call {
                op,
                code: response.code,
                message: response.message.unwrap_or_default(),
            });
        }
        Ok(response)
    }
}

impl AutomationSession for BridgeSession {
    fn open(&mut self, path: &Path) -> Result<DocHandle, AutomationError> {
        self.call(&Request::Open {
            path,
            confirm_conversions: false,
            read_only: false,
            add_to_recent_files: false,
        })?
        .doc("open")
    }

    fn compare(&mut self, request: &CompareRequest) -> Result<DocHandle, AutomationError> {
        self.call(&Request::Compare(request))?.doc("compare")
    }

    fn merge(&mut self, request: &CompareRequest) -> Result<DocHandle, AutomationError> {
        self.call(&Request::Merge(request))?.doc("merge")
    }

    fn merge_into(&mut self, target: DocHandle, path: &Path) -> Result<(), AutomationError> {
        self.call(&Request::MergeInto { doc: target, path })?;
        Ok(())
    }

    fn save_as(&mut self, doc: DocHandle, path: &Path) -> Result<(), AutomationError> {
        self.call(&Request::SaveAs {
            doc,
            path,
            add_to_recent_files: false,
        })?;
        Ok(())
    }

    fn close(&mut self, doc: DocHandle, save: SaveChanges) -> Result<(), AutomationError> {
        self.call(&Request::Close { doc, save })?;
        Ok(())
    }

    fn mark_saved(&mut self, doc: DocHandle) -> Result<(), AutomationError> {
        self.call(&Request::MarkSaved { doc })?;
        Ok(())
    }

    fn find_open(&mut self, path: &Path) -> Result<DocHandle, AutomationError> {
        self.call(&Request::FindOpen { path })?.doc("find_open")
    }

    fn track_revisions(&mut self, doc: DocHandle) -> Result<bool, AutomationError> {
        self.call(&Request::TrackRevisions { doc })?
            .bool_value("track_revisions")
    }

    fn revision_count(&mut self, doc: DocHandle) -> Result<u32, AutomationError> {
        self.call(&Request::RevisionCount { doc })?
            .u32_value("revision_count")
    }

    fn document_count(&mut self) -> Result<u32, AutomationError> {
        self.call(&Request::DocumentCount)?.u32_value("document_count")
    }

    fn set_visible(&mut self, visible: bool) -> Result<(), AutomationError> {
        self.call(&Request::SetVisible { visible })?;
        Ok(())
    }

    fn bring_to_front(&mut self) -> Result<(), AutomationError> {
        self.call(&Request::BringToFront)?;
        Ok(())
    }

    fn quit(&mut self) -> Result<(), AutomationError> {
        self.call(&Request::Quit)?;
        self.stdin.take();
        if let Err(e) = self.child.wait() {
            debug!(error = %e, "bridge did not exit cleanly");
        }
        Ok(())
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        // Closing stdin tells the bridge to detach; the host application
        // stays up if it still shows documents to the user.
        self.stdin.take();
        let _ = self.child.try_wait();
    }
}
