//! Test doubles for the external collaborators: Git LFS, the host
//! application and the user.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Mutex;

use dmfo_core::backend::{
    AutomationSession, CompareDestination, CompareRequest, DocHandle, SaveChanges,
    SessionFactory,
};
use dmfo_core::errors::{AutomationError, LfsError};
use dmfo_core::lfs::{self, LfsFilter, PointerStatus};
use dmfo_core::models::HostApp;

// ===========================================================================
// Git LFS
// ===========================================================================

/// Marker content that makes the pointer check return an unknown status.
pub const UNKNOWN_STATUS_MARKER: &[u8] = b"dmfo-test: unknown lfs status";

/// Pointer text Git LFS would write for `content`.
pub fn pointer_text(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let oid = hex::encode(Sha256::digest(content));
    format!(
        "version https://git-lfs.github.com/spec/v1\noid sha256:{oid}\nsize {}\n",
        content.len()
    )
}

/// In-memory LFS object store.
#[derive(Default)]
pub struct MemoryLfs {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryLfs {
    /// Store `content` and return its pointer text.
    pub fn pointer_for(&self, content: &[u8]) -> String {
        let pointer = pointer_text(content);
        let oid = lfs::parse_lfs_pointer(pointer.as_bytes()).unwrap().oid;
        self.objects.lock().unwrap().insert(oid, content.to_vec());
        pointer
    }
}

impl LfsFilter for MemoryLfs {
    fn check_pointer(&self, path: &Path) -> Result<PointerStatus, LfsError> {
        match std::fs::read(path) {
            Ok(bytes) if bytes == UNKNOWN_STATUS_MARKER => Err(LfsError::UnknownStatus {
                path: path.to_path_buf(),
                code: 128,
            }),
            Ok(bytes) if lfs::is_lfs_pointer(&bytes) => Ok(PointerStatus::Pointer),
            Ok(_) => Ok(PointerStatus::Content),
            Err(_) => Err(LfsError::FileNotFound(path.to_path_buf())),
        }
    }

    fn smudge(&self, pointer: &Path, dest: &Path) -> Result<(), LfsError> {
        let stub = std::fs::read(pointer)?;
        let oid = lfs::parse_lfs_pointer(&stub).unwrap().oid;
        let content = self.objects.lock().unwrap().get(&oid).cloned().unwrap();
        std::fs::write(dest, content)?;
        Ok(())
    }

    fn clean(&self, content: &Path, dest: &Path) -> Result<(), LfsError> {
        let bytes = std::fs::read(content)?;
        let pointer = self.pointer_for(&bytes);
        std::fs::write(dest, pointer)?;
        Ok(())
    }
}

// ===========================================================================
// Host application
// ===========================================================================

/// Knobs and observations shared between a [`FakeOffice`] and its sessions.
pub struct OfficeState {
    /// `false` makes every launch fail.
    pub installed: bool,
    /// Applications launched, in order.
    pub launches: Vec<HostApp>,
    /// Every call, e.g. `open /tmp/x.docx`, `compare`, `quit`.
    pub calls: Vec<String>,
    /// Open documents and the file each one was loaded from or saved to.
    pub documents: BTreeMap<u64, Option<PathBuf>>,
    next_handle: u64,
    /// Operation name that fails with an automation error.
    pub fail_op: Option<&'static str>,
    /// Bytes written by `save_as`.
    pub saved_content: Vec<u8>,
    /// Revisions left in the merge result.
    pub revisions: u32,
    pub track_revisions: bool,
    /// Simulate the user closing the merge result before confirming.
    pub user_closes_document: bool,
    /// Simulate the user quitting the application before confirming.
    pub user_quits_application: bool,
}

impl Default for OfficeState {
    fn default() -> Self {
        Self {
            installed: true,
            launches: Vec::new(),
            calls: Vec::new(),
            documents: BTreeMap::new(),
            next_handle: 1,
            fail_op: None,
            saved_content: b"merged document".to_vec(),
            revisions: 0,
            track_revisions: false,
            user_closes_document: false,
            user_quits_application: false,
        }
    }
}

impl OfficeState {
    pub fn called(&self, op: &str) -> bool {
        self.calls.iter().any(|c| c == op || c.starts_with(&format!("{op} ")))
    }

    fn new_document(&mut self, path: Option<PathBuf>) -> DocHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.documents.insert(handle, path);
        DocHandle(handle)
    }
}

/// [`SessionFactory`] over a shared [`OfficeState`].
#[derive(Clone, Default)]
pub struct FakeOffice {
    pub state: Rc<RefCell<OfficeState>>,
}

impl FakeOffice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(self, f: impl FnOnce(&mut OfficeState)) -> Self {
        f(&mut self.state.borrow_mut());
        self
    }
}

impl SessionFactory for FakeOffice {
    fn launch(&self, app: HostApp) -> Result<Box<dyn AutomationSession>, AutomationError> {
        let mut state = self.state.borrow_mut();
        if !state.installed {
            return Err(AutomationError::LaunchFailed {
                app,
                detail: "Invalid class string".into(),
            });
        }
        state.launches.push(app);
        Ok(Box::new(FakeSession {
            state: Rc::clone(&self.state),
            alive: true,
        }))
    }
}

struct FakeSession {
    state: Rc<RefCell<OfficeState>>,
    alive: bool,
}

impl FakeSession {
    fn enter(&mut self, op: &'static str, detail: Option<&Path>) -> Result<(), AutomationError> {
        if !self.alive {
            return Err(AutomationError::SessionLost {
                op,
                detail: "bridge exited".into(),
            });
        }
        let mut state = self.state.borrow_mut();
        match detail {
            Some(path) => state.calls.push(format!("{op} {}", path.display())),
            None => state.calls.push(op.to_string()),
        }
        if state.fail_op == Some(op) {
            return Err(AutomationError::Call {
                op,
                code: Some(-2146824090),
                message: "scripted failure".into(),
            });
        }
        Ok(())
    }

    fn require(&self, op: &'static str, doc: DocHandle) -> Result<(), AutomationError> {
        if self.state.borrow().documents.contains_key(&doc.0) {
            Ok(())
        } else {
            Err(AutomationError::Call {
                op,
                code: Some(-2147352567),
                message: format!("no document {}", doc.0),
            })
        }
    }
}

impl AutomationSession for FakeSession {
    fn open(&mut self, path: &Path) -> Result<DocHandle, AutomationError> {
        self.enter("open", Some(path))?;
        if !path.exists() {
            return Err(AutomationError::Call {
                op: "open",
                code: Some(-2146823114),
                message: format!("'{}' not found", path.display()),
            });
        }
        Ok(self.state.borrow_mut().new_document(Some(path.to_path_buf())))
    }

    fn compare(&mut self, request: &CompareRequest) -> Result<DocHandle, AutomationError> {
        self.enter("compare", None)?;
        self.require("compare", request.original)?;
        self.require("compare", request.revised)?;
        Ok(match request.destination {
            CompareDestination::Original => request.original,
            CompareDestination::Revised => request.revised,
            CompareDestination::New => self.state.borrow_mut().new_document(None),
        })
    }

    fn merge(&mut self, request: &CompareRequest) -> Result<DocHandle, AutomationError> {
        self.enter("merge", None)?;
        self.require("merge", request.original)?;
        self.require("merge", request.revised)?;
        Ok(self.state.borrow_mut().new_document(None))
    }

    fn merge_into(&mut self, target: DocHandle, path: &Path) -> Result<(), AutomationError> {
        self.enter("merge_into", Some(path))?;
        self.require("merge_into", target)
    }

    fn save_as(&mut self, doc: DocHandle, path: &Path) -> Result<(), AutomationError> {
        self.enter("save_as", Some(path))?;
        self.require("save_as", doc)?;
        let mut state = self.state.borrow_mut();
        std::fs::write(path, &state.saved_content).map_err(|e| AutomationError::Call {
            op: "save_as",
            code: None,
            message: e.to_string(),
        })?;
        state.documents.insert(doc.0, Some(path.to_path_buf()));
        Ok(())
    }

    fn close(&mut self, doc: DocHandle, _save: SaveChanges) -> Result<(), AutomationError> {
        self.enter("close", None)?;
        self.require("close", doc)?;
        self.state.borrow_mut().documents.remove(&doc.0);
        Ok(())
    }

    fn mark_saved(&mut self, doc: DocHandle) -> Result<(), AutomationError> {
        self.enter("mark_saved", None)?;
        self.require("mark_saved", doc)
    }

    fn find_open(&mut self, path: &Path) -> Result<DocHandle, AutomationError> {
        self.enter("find_open", Some(path))?;
        let mut state = self.state.borrow_mut();
        if state.user_quits_application {
            state.user_quits_application = false;
            state.documents.clear();
            self.alive = false;
            return Err(AutomationError::Call {
                op: "find_open",
                code: Some(-2147023174),
                message: "The RPC server is unavailable".into(),
            });
        }
        if state.user_closes_document {
            state.user_closes_document = false;
            state.documents.retain(|_, p| p.as_deref() != Some(path));
        }
        state
            .documents
            .iter()
            .find(|(_, p)| p.as_deref() == Some(path))
            .map(|(h, _)| DocHandle(*h))
            .ok_or_else(|| AutomationError::Call {
                op: "find_open",
                code: Some(-2147352567),
                message: "Bad file name".into(),
            })
    }

    fn track_revisions(&mut self, doc: DocHandle) -> Result<bool, AutomationError> {
        self.enter("track_revisions", None)?;
        self.require("track_revisions", doc)?;
        Ok(self.state.borrow().track_revisions)
    }

    fn revision_count(&mut self, doc: DocHandle) -> Result<u32, AutomationError> {
        self.enter("revision_count", None)?;
        self.require("revision_count", doc)?;
        Ok(self.state.borrow().revisions)
    }

    fn document_count(&mut self) -> Result<u32, AutomationError> {
        self.enter("document_count", None)?;
        Ok(self.state.borrow().documents.len() as u32)
    }

    fn set_visible(&mut self, _visible: bool) -> Result<(), AutomationError> {
        self.enter("set_visible", None)
    }

    fn bring_to_front(&mut self) -> Result<(), AutomationError> {
        self.enter("bring_to_front", None)
    }

    fn quit(&mut self) -> Result<(), AutomationError> {
        self.enter("quit", None)?;
        self.state.borrow_mut().documents.clear();
        self.alive = false;
        Ok(())
    }
}

// ===========================================================================
// Filesystem helpers
// ===========================================================================

pub fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Sorted file names in `dir`.
pub fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
