//! Data model shared by staging, dispatch and the backends.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::DocHandle;
use crate::extension;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// A file's position in a diff or three-way merge.
///
/// The declaration order is also the staging order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Local,
    Remote,
    Base,
    /// Merge output; always lands on the LOCAL file.
    Merge,
    /// Diff output; an unsaved document that only lives inside the host.
    Diff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Remote => "REMOTE",
            Self::Base => "BASE",
            Self::Merge => "MERGE",
            Self::Diff => "DIFF",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Which Git driver contract this invocation is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Diff,
    Merge,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diff => f.write_str("diff"),
            Self::Merge => f.write_str("merge"),
        }
    }
}

// ---------------------------------------------------------------------------
// Host application
// ---------------------------------------------------------------------------

/// External application that performs the actual comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostApp {
    Word,
    PowerPoint,
}

impl HostApp {
    /// Automation programmatic name, e.g. `Word` for `Word.Application`.
    pub fn automation_name(&self) -> &'static str {
        match self {
            Self::Word => "Word",
            Self::PowerPoint => "PowerPoint",
        }
    }
}

impl fmt::Display for HostApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Microsoft {}", self.automation_name())
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Terminal result of one invocation, as consumed by Git.
///
/// | Code | Meaning |
/// |------|---------|
/// | 0 | diff shown / merge fully resolved |
/// | 1 | merge not fully resolved |
/// | 2 | unsupported file extension |
/// | 3 | host application not installed |
/// | 4 | input file not found |
/// | 5 | unrecognized LFS pointer-check status |
/// | 6 | unexpected failure from an external collaborator |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Unresolved,
    UnsupportedExtension,
    BackendUnavailable,
    FileNotFound,
    UnknownLfsStatus,
    BackendOperationFailed,
}

impl Outcome {
    pub fn code(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Unresolved => 1,
            Self::UnsupportedExtension => 2,
            Self::BackendUnavailable => 3,
            Self::FileNotFound => 4,
            Self::UnknownLfsStatus => 5,
            Self::BackendOperationFailed => 6,
        }
    }

    /// `true` for the two outcomes Git treats as a normal run.
    pub fn is_clean_exit(&self) -> bool {
        self.code() <= 1
    }
}

impl From<Outcome> for std::process::ExitCode {
    fn from(outcome: Outcome) -> Self {
        std::process::ExitCode::from(outcome.code())
    }
}

// ---------------------------------------------------------------------------
// Target extension
// ---------------------------------------------------------------------------

/// The suffix (with leading dot, e.g. `.docx`) every staged file must carry.
///
/// Derived once per invocation from the document Git is asking about and
/// passed explicitly to every staging and teardown call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetExtension(String);

impl TargetExtension {
    pub fn new(ext: impl Into<String>) -> Self {
        Self(ext.into())
    }

    /// Take the suffix of `path`; empty when it has none.
    pub fn from_path(path: &Path) -> Self {
        Self(extension::suffix(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TargetExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// StagedFile
// ---------------------------------------------------------------------------

/// One role's file and everything staging learned about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Path as supplied by Git; absolute once staging resolved it.
    pub original_path: PathBuf,
    /// Path handed to the host application.
    pub effective_path: PathBuf,
    /// Whether the original was a Git LFS pointer.
    pub is_lfs: bool,
    /// Set once staging finished for this role.
    pub staged: bool,
    /// Open document in the host session, if any.
    pub backend_handle: Option<DocHandle>,
}

impl StagedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            effective_path: path.clone(),
            original_path: path,
            is_lfs: false,
            staged: false,
            backend_handle: None,
        }
    }

    /// `true` when staging created an auxiliary file next to the original.
    pub fn has_aux_file(&self) -> bool {
        self.effective_path != self.original_path
    }
}

// ---------------------------------------------------------------------------
// RoleMap
// ---------------------------------------------------------------------------

/// Role → file mapping for one invocation.
///
/// Passed by reference into each phase instead of living in global state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMap {
    files: BTreeMap<Role, StagedFile>,
}

impl RoleMap {
    pub fn for_diff(local: impl Into<PathBuf>, remote: impl Into<PathBuf>) -> Self {
        let mut map = Self::default();
        map.files.insert(Role::Local, StagedFile::new(local));
        map.files.insert(Role::Remote, StagedFile::new(remote));
        map
    }

    pub fn for_merge(
        base: impl Into<PathBuf>,
        local: impl Into<PathBuf>,
        remote: impl Into<PathBuf>,
    ) -> Self {
        let mut map = Self::for_diff(local, remote);
        map.files.insert(Role::Base, StagedFile::new(base));
        map
    }

    pub fn get(&self, role: Role) -> Option<&StagedFile> {
        self.files.get(&role)
    }

    pub fn get_mut(&mut self, role: Role) -> Option<&mut StagedFile> {
        self.files.get_mut(&role)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.files.contains_key(&role)
    }

    pub fn roles(&self) -> Vec<Role> {
        self.files.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &StagedFile)> {
        self.files.iter().map(|(role, file)| (*role, file))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Role, &mut StagedFile)> {
        self.files.iter_mut().map(|(role, file)| (*role, file))
    }

    /// Register the MERGE role once the host has saved a merge result.
    ///
    /// MERGE shares LOCAL's paths (Git expects the result in the LOCAL
    /// file) and counts as LFS-managed when either side was.
    pub fn register_merge_output(&mut self) -> Option<&StagedFile> {
        let local = self.files.get(&Role::Local)?;
        let remote_lfs = self.files.get(&Role::Remote).is_some_and(|f| f.is_lfs);
        let merge = StagedFile {
            original_path: local.original_path.clone(),
            effective_path: local.effective_path.clone(),
            is_lfs: local.is_lfs || remote_lfs,
            staged: true,
            backend_handle: None,
        };
        self.files.insert(Role::Merge, merge);
        self.files.get(&Role::Merge)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_iterate_in_staging_order() {
        let map = RoleMap::for_merge("base", "local", "remote");
        assert_eq!(map.roles(), vec![Role::Local, Role::Remote, Role::Base]);
    }

    #[test]
    fn test_register_merge_output_aliases_local() {
        let mut map = RoleMap::for_merge("b", "/w/local", "r");
        {
            let local = map.get_mut(Role::Local).unwrap();
            local.effective_path = PathBuf::from("/w/local.docx");
        }
        map.get_mut(Role::Remote).unwrap().is_lfs = true;

        let merge = map.register_merge_output().unwrap().clone();
        assert_eq!(merge.original_path, PathBuf::from("/w/local"));
        assert_eq!(merge.effective_path, PathBuf::from("/w/local.docx"));
        assert!(merge.is_lfs);
        assert!(map.contains(Role::Merge));
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(Outcome::Success.code(), 0);
        assert_eq!(Outcome::Unresolved.code(), 1);
        assert_eq!(Outcome::BackendOperationFailed.code(), 6);
        assert!(Outcome::Unresolved.is_clean_exit());
        assert!(!Outcome::UnsupportedExtension.is_clean_exit());
    }

    #[test]
    fn test_target_extension_from_path() {
        assert_eq!(
            TargetExtension::from_path(Path::new("docs/report.docx")).as_str(),
            ".docx"
        );
        assert!(TargetExtension::from_path(Path::new(".merge_file_a1b2")).is_empty());
    }
}
